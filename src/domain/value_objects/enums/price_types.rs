use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    #[default]
    OneTime,
    Recurring,
}

impl Display for PriceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let price_type = match self {
            PriceType::OneTime => "one_time",
            PriceType::Recurring => "recurring",
        };
        write!(f, "{}", price_type)
    }
}
