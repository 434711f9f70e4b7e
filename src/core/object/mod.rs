//! Object data model: ObjId minting, the bounded `ObjInfo` cache, and
//! the simple-field read/write primitives the transaction engine
//! drives.

pub mod cache;
pub mod mint;

pub use cache::{ObjInfo, ObjInfoCache};
pub use mint::mint_obj_id;
