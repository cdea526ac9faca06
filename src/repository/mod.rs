//! Repository layer
//!
//! CRUD-style facades over the persisted JSON collections. Each repository
//! reads its whole collection, filters or mutates in memory, and writes the
//! whole collection back (acceptable for small local datasets; last writer
//! wins).

pub mod appointments;
pub mod users;

pub use appointments::AppointmentRepository;
pub use users::UserRepository;
