pub mod command;
pub mod message;

pub use command::CommandHandler;
pub use message::MessageHandler;
