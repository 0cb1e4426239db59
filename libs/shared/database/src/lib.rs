pub mod directory;
pub mod supabase;

pub use directory::{
    InMemoryTherapyCatalog, InMemoryUserDirectory, SupabaseTherapyCatalog,
    SupabaseUserDirectory, TherapyCatalog, UserDirectory,
};
pub use supabase::{SupabaseApiError, SupabaseClient};
