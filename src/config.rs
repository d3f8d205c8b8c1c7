use crate::normalizer::{DilutionPolicy, ReferencePolicy};

pub struct Config {
    pub symbol: String,
    pub output_path: String,
    pub branch: String,
    pub push: bool,
    pub reference_policy: ReferencePolicy,
    pub dilution_policy: DilutionPolicy,
}

impl Config {
    pub fn new() -> Self {
        Self {
            symbol: "BMNR".to_string(),
            output_path: "docs/bmnr.json".to_string(),
            branch: "main".to_string(),
            push: false,
            reference_policy: ReferencePolicy::PreviousClose,
            dilution_policy: DilutionPolicy::EqualBasic,
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.to_uppercase();
        self
    }

    pub fn with_output_path(mut self, path: &str) -> Self {
        self.output_path = path.to_string();
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn with_reference_policy(mut self, policy: ReferencePolicy) -> Self {
        self.reference_policy = policy;
        self
    }

    pub fn with_dilution_policy(mut self, policy: DilutionPolicy) -> Self {
        self.dilution_policy = policy;
        self
    }
}
