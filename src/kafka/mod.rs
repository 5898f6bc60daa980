pub mod producer;
pub mod topic_manager;


pub use producer::KafkaPublisher;
pub use topic_manager::TopicManager;
