pub(crate) mod session_cleanup;
