use serde::{Deserialize, Serialize};

/// One suggested stock for an investment theme, as produced by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockIdea {
    pub ticker: String,
    pub name: String,
    pub reason: String,
}
