//! Core data models for publications and paginated queries.

mod publication;
mod request;

pub use publication::{
    read_literature, write_literature, Abstract, Publication, PublicationBuilder,
    PublicationIoError, Review,
};
pub use request::{rounds_needed, Request, Response, DEFAULT_PER_PAGE};
