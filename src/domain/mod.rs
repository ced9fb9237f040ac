pub mod engagement;
pub mod id;
pub mod post;
pub mod social_graph;
pub mod story;
pub mod user;
