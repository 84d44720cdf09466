pub mod assistant;

pub use assistant::{AssistReply, AssistRequest};
