mod pg;

pub use pg::PgCacheStore;
