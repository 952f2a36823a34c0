pub(crate) mod auth;
pub(crate) mod editor;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod question_files;
pub(crate) mod quiz;
pub(crate) mod router;
pub(crate) mod upload;
pub(crate) mod users;
