//! Templates compiled into the binary

/// `(file stem, source)` of every embedded template
pub const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[
    ("router", include_str!("../../prompts/router.md")),
    (
        "technical_specialist",
        include_str!("../../prompts/technical_specialist.md"),
    ),
    (
        "compliance_auditor",
        include_str!("../../prompts/compliance_auditor.md"),
    ),
    (
        "support_concierge",
        include_str!("../../prompts/support_concierge.md"),
    ),
];

/// Family shared by the embedded templates
pub const BANK_OPS_FAMILY: &str = "bank_ops";

/// Agents that produce answers; the router only selects among these
pub const SPECIALIST_AGENTS: &[&str] = &[
    "technical_specialist",
    "compliance_auditor",
    "support_concierge",
];

/// Template used by the routing step
pub const ROUTER_TEMPLATE: &str = "router";
