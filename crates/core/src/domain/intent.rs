use serde::{Deserialize, Serialize};

/// The closed set of per-turn classifications. Exactly one is assigned to
/// every inbound message by walking [`IntentCategory::PRIORITY`] in order
/// and firing the first rule that matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentCategory {
    PhoneCapture,
    Negotiation,
    DeliveryInquiry,
    PickupConfirmation,
    PhoneRequest,
    Confirmation,
    Thanks,
    Goodbye,
    QuantityFollowUp,
    PriceInquiry,
    DirectProductMention,
    Greeting,
    GeneralInterest,
    Fallback,
}

impl IntentCategory {
    /// The fixed, exclusive evaluation order of the response policy. The
    /// position in this list is the rule number; earlier entries always win.
    pub const PRIORITY: [IntentCategory; 14] = [
        Self::PhoneCapture,
        Self::Negotiation,
        Self::DeliveryInquiry,
        Self::PickupConfirmation,
        Self::PhoneRequest,
        Self::Confirmation,
        Self::Thanks,
        Self::Goodbye,
        Self::QuantityFollowUp,
        Self::PriceInquiry,
        Self::DirectProductMention,
        Self::Greeting,
        Self::GeneralInterest,
        Self::Fallback,
    ];
}
