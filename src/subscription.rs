use crate::{
    error::ApiError,
    models::{Plan, Role},
};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The purchasable tiers, ordered by their position on the paid ladder.
pub fn plans() -> Vec<Plan> {
    let mut catalog = vec![
        Plan {
            id: Role::Free,
            name: "Free".to_string(),
            monthly_price_cents: 0,
            description: "Discover the platform".to_string(),
            features: strings(&[
                "All lessons",
                "Basic interactive visualisations",
                "Limited access to simple exercises",
            ]),
            not_included: strings(&[
                "Exam-style exercises",
                "Detailed solutions",
                "Progress tracking",
                "Unlimited exercises",
                "Personalised recommendations",
            ]),
            highlight: false,
        },
        Plan {
            id: Role::Premium,
            name: "Premium".to_string(),
            monthly_price_cents: 999,
            description: "Our most popular plan".to_string(),
            features: strings(&[
                "All lessons",
                "Basic interactive visualisations",
                "Limited access to simple exercises",
                "5 exam-style exercises per month",
                "Detailed solutions",
                "Progress tracking",
            ]),
            not_included: strings(&["Unlimited exercises", "Personalised recommendations"]),
            highlight: true,
        },
        Plan {
            id: Role::Vip,
            name: "VIP".to_string(),
            monthly_price_cents: 1999,
            description: "For the most thorough preparation".to_string(),
            features: strings(&[
                "All lessons",
                "Basic interactive visualisations",
                "Limited access to simple exercises",
                "Unlimited exam-style exercises",
                "Detailed solutions",
                "Progress tracking",
                "Performance analysis",
                "Personalised recommendations",
            ]),
            not_included: vec![],
            highlight: false,
        },
    ];
    catalog.sort_by_key(|plan| plan.id.tier());
    catalog
}

/// validate_plan_change
///
/// Resolves `plan_id` to a role on the paid ladder and checks it differs from
/// `current`. Payment is out of scope: an accepted change is applied as a plain
/// role overwrite.
pub fn validate_plan_change(current: Role, plan_id: &str) -> Result<Role, ApiError> {
    let target = Role::parse(plan_id)
        .filter(|role| role.tier().is_some())
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown plan: {plan_id}")))?;

    if target == current {
        return Err(ApiError::Conflict("Already subscribed to this plan"));
    }
    Ok(target)
}
