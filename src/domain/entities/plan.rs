use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Plan recorded for accounts without a paid subscription.
pub const FREE_PLAN: &str = "free";

/// Plan assumed when a completed checkout carries no plan metadata.
pub const BASELINE_PLAN: &str = "starter";

/// Plan forced onto the reserved super-admin account.
pub const ELEVATED_PLAN: &str = "growth";

/// Plans that can be purchased through checkout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutPlan {
    Starter,
    Professional,
    Enterprise,
}

impl CheckoutPlan {
    pub fn code(&self) -> &str {
        self.as_ref()
    }
}
