//! # chatter-core
//!
//! Wire types shared by the relay server and its clients: the chat
//! `Message` payload and its validation rules.

#![deny(unsafe_code)]

pub mod message;

pub use message::{Message, MessageError};
