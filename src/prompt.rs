// ABOUTME: System prompt composition - base persona, generalist checklist,
// ABOUTME: and per-role instruction blocks for multi-agent dispatch.

use crate::config::{AgentDescriptor, Role};

/// Base persona and formatting contract shared by every composed prompt.
const BASE_PERSONA: &str = "\
You are an expert travel planning assistant.

Format responses using markdown:
  **Headings** for sections:
  # Main Title
  ## Itinerary
  ### Day 1

  **Lists** for activities:
  - Morning: Activity 1
  - Afternoon: Activity 2

  **Code blocks** for exact addresses:
  ```
  123 Main St, Paris
  ```

  **Bold** for important info: **Budget**: \u{20ac}200/day

  **Links** when relevant: [More info](https://example.com)

  Always use proper line breaks between sections.
  Emojis for better readability
  Estimated costs where relevant

Ask clarifying questions if needed.";

/// Full generalist scope, appended when the agent must act as a
/// complete travel planner.
const GENERALIST_CHECKLIST: &str = "\
Provide:
- Destination recommendations with pros/cons
- Detailed itineraries with time allocations
- Budget estimates (budget/mid-range/luxury)
- Local customs/tips (dos and don'ts)
- Weather considerations
- Safety advisories
- Transportation options and costs
- Visa requirements if international
- Packing suggestions";

impl Role {
    /// The fixed instruction block this role contributes during
    /// multi-agent dispatch.
    pub fn instructions(&self) -> String {
        match self {
            Role::ItineraryPlanner => "\
As the ItineraryPlanner, focus on:
- Detailed day-by-day itineraries with time allocations
- Activity scheduling and pacing
- Transportation between activities"
                .to_string(),
            Role::BudgetAdvisor => "\
As the BudgetAdvisor, focus on:
- Budget estimates across tiers (budget/mid-range/luxury)
- Cost breakdowns and money-saving tips"
                .to_string(),
            Role::LocalCultureExpert => "\
As the LocalCultureExpert, focus on:
- Local customs and etiquette (dos and don'ts)
- Safety advisories
- Weather considerations
- Packing suggestions"
                .to_string(),
            Role::RecommendationEngine => "\
As the RecommendationEngine, focus on:
- Destination recommendations with pros/cons
- Visa requirements if international"
                .to_string(),
            Role::Other(name) => format!(
                "For your assigned role \"{}\", use your general travel expertise.",
                name
            ),
        }
    }
}

/// Compose the system prompt for one agent in a dispatch.
///
/// A missing descriptor, a descriptor with no roles, or a sole-target
/// dispatch all get the full generalist checklist: when only one agent
/// answers, it must behave as a complete travel planner regardless of
/// its configured roles. Only a multi-agent dispatch narrows the prompt
/// to the agent's role scope, so the responses complement instead of
/// repeating each other.
pub fn compose_system_prompt(descriptor: Option<&AgentDescriptor>, sole_target: bool) -> String {
    let mut sections = vec![BASE_PERSONA.to_string()];

    match descriptor {
        Some(desc) if !desc.roles.is_empty() && !sole_target => {
            let role_names: Vec<&str> = desc.roles.iter().map(|r| r.display_name()).collect();
            sections.push(format!(
                "You are one of several specialist assistants answering together. \
                 Your assigned role(s): {}. Keep your answer within this scope; \
                 the other assistants cover the rest.",
                role_names.join(", ")
            ));
            for role in &desc.roles {
                sections.push(role.instructions());
            }
        }
        _ => sections.push(GENERALIST_CHECKLIST.to_string()),
    }

    sections.join("\n\n")
}

/// Build a canned itinerary request prompt.
pub fn itinerary_prompt(destination: &str, days: u32, budget: &str, interests: &[&str]) -> String {
    format!(
        "Create a {days}-day itinerary for {destination} with {budget} budget focusing on: {}. Include:
- Daily schedule with time slots
- Activity recommendations
- Restaurant suggestions
- Transportation options
- Estimated costs",
        interests.join(", ")
    )
}
