/// Feed module
///
/// Everything between the gallery collaborators and the render list:
/// - List and favorites collaborator traits, request encoding (source.rs)
/// - reqwest-backed collaborators (http.rs)
/// - Bulk favorites cache, the local pagination source (favorites.rs)
/// - Ordered, deduplicated render list (render_list.rs)
/// - Remote cursor and local offset pagination (pagination.rs)
/// - Deferred video loading near the viewport (hydration.rs)
/// - Bounded viewport fill loop (autofill.rs)

pub mod source;
pub mod http;
pub mod favorites;
pub mod render_list;
pub mod pagination;
pub mod hydration;
pub mod autofill;
