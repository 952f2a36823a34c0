pub(crate) mod accounts;
pub(crate) mod credentials;
pub(crate) mod embedding;
pub(crate) mod question_files;
pub(crate) mod quiz_session;
pub(crate) mod reference_index;
pub(crate) mod scoring;
pub(crate) mod session_store;
pub(crate) mod spreadsheet;
pub(crate) mod user_import;
