//! Outbound delivery paths: the Messenger reply channel and the urgent
//! lead-alert chain.

pub mod messenger;
pub mod notify;

pub use messenger::{ChannelError, DisabledMessenger, GraphApiMessenger, MessagingChannel};
pub use notify::{
    AlertChannel, CallbackTextChannel, DurableLogChannel, LeadAlert, NotifierChain,
    WhatsAppFormChannel,
};
