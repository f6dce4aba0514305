// Integration tests

mod common;
mod routes_test;
