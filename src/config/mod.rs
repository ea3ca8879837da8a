mod collection_args;

pub use collection_args::{Backend, CollectionArgs};
