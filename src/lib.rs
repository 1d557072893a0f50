// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the subcommands.
//
// Module responsibilities:
// - `client`: Encapsulates the HTTP session against a pwn.college
//   instance (cookies, CSRF nonce, login/logout, API calls, page fetches).
// - `scrape`: Stateless parsers from the site's HTML to typed records.
// - `config`: Credential sources (config file, password command, prompts).
// - `cli`: Argument definitions and subcommand dispatch.
//
// Keeping this separation makes the parsing and credential logic testable
// without touching the network.
pub mod cli;
pub mod client;
pub mod config;
pub mod scrape;
