//! Example prompts shown to new users.

/// Questions the demo schema (procedures and customers) can answer.
pub const EXAMPLE_PROMPTS: [&str; 6] = [
    "Show me all procedures in the imaging category that are insured.",
    "Return to me the number of procedures that are in the laboratory category.",
    "Let me see the number of procedures that are either in the laboratory, imaging, or surgery category, and insured.",
    "Return me information on all customers who have a past due amount over 70.",
    "Provide me details on all customers who are VIP, and have a balance over 300.",
    "Get me data of all procedures that were not insured, with customer names.",
];
