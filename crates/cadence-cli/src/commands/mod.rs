pub mod add;
pub mod delete;
pub mod describe;
pub mod edit;
pub mod generate;
pub mod pattern;
pub mod pause;
pub mod preview;
pub mod scope;
pub mod show;
