use mercabot_core::{Direction, Message, Product};

use crate::signals;

/// What the bot's most recent reply was about, used to disambiguate bare
/// acknowledgements like "ok".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotTopic {
    DiscountOrPrice,
    Delivery,
    Other,
}

/// Facts derived from the bounded conversation window (newest first).
#[derive(Clone, Debug)]
pub struct ConversationContext {
    pub last_product: Option<Product>,
    pub last_bot_reply: Option<String>,
}

impl ConversationContext {
    /// `window` must be ordered newest first, as the conversation store
    /// returns it. An empty window resolves to an empty context.
    pub fn resolve(window: &[Message], catalog: &[Product]) -> Self {
        let last_product = window
            .iter()
            .filter(|message| message.direction == Direction::Inbound)
            .find_map(|message| signals::detect_product(&message.text, catalog).cloned());

        let last_bot_reply = window
            .iter()
            .find(|message| message.direction == Direction::Outbound)
            .map(|message| message.text.clone());

        Self { last_product, last_bot_reply }
    }

    pub fn last_bot_topic(&self) -> BotTopic {
        let Some(reply) = &self.last_bot_reply else {
            return BotTopic::Other;
        };
        let lowered = reply.to_lowercase();

        if lowered.contains("descuento") || lowered.contains("bs") {
            BotTopic::DiscountOrPrice
        } else if lowered.contains("envio") || lowered.contains("envío") || lowered.contains("delivery")
        {
            BotTopic::Delivery
        } else {
            BotTopic::Other
        }
    }
}
