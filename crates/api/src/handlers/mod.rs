pub mod attachments;
pub mod health;
pub mod resources;
pub mod token;

pub use attachments::upload_attachment;
pub use health::health;
pub use resources::{
    bulk_delete_resources, create_resource, delete_resource, get_resource, list_resources, patch_resource,
    replace_resource,
};
pub use token::access_token;
