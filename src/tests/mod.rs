//! End-to-end tests against the assembled router.
