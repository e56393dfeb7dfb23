//! IP Gate for Zentinel.
//!
//! Routes each request to its primary handler or to a fallback handler
//! based on the client address and a small, fixed allowlist or denylist.
//!
//! # Features
//!
//! - **Allow or Deny Mode** - Exactly one list; listed addresses pass (allow)
//!   or are diverted (deny)
//! - **IPv4 and IPv6** - Single addresses and CIDR blocks of either family
//! - **Fail-Fast Construction** - Every entry is validated up front; a bad
//!   entry is reported by its literal text
//! - **No Request-Time Errors** - A missing or malformed client address is
//!   simply "no match"; an address with a port (`10.1.2.3:8080`) is matched
//!   on its address part
//! - **Pluggable Extraction** - Read the peer address, trust proxy headers,
//!   or supply a closure
//! - **Default Fallback** - Without a custom fallback, denied requests get 403
//!
//! # Example
//!
//! ```
//! use zentinel_ip_gate::{Gate, PeerAddress, Respond};
//!
//! struct Req {
//!     peer: String,
//! }
//!
//! impl PeerAddress for Req {
//!     fn connection_remote_addr(&self) -> Option<&str> {
//!         Some(self.peer.as_str())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Res {
//!     status: u16,
//! }
//!
//! impl Respond for Res {
//!     fn set_status(&mut self, status: u16) {
//!         self.status = status;
//!     }
//!
//!     fn end(&mut self) {}
//! }
//!
//! let gate = Gate::builder().allowlist(["192.168.0.0/24"]).build()?;
//! let entry = gate.bind(|_req: Req, res: &mut Res| res.status = 200);
//!
//! let mut res = Res::default();
//! entry.call(Req { peer: "10.0.0.1".into() }, &mut res);
//! assert_eq!(res.status, 403);
//! # Ok::<(), zentinel_ip_gate::GateError>(())
//! ```
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   log_denied: true
//!
//! denylist:
//!   - "203.0.113.0/24"
//!   - "2001:db8::/32"
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod gate;
pub mod matcher;
pub mod sources;

pub use config::Config;
pub use error::GateError;
pub use extract::{DefaultExtractor, Extract, HeaderExtractor, PeerAddress};
pub use gate::{Entry, Forbidden, Gate, GateBuilder, Handler, Mode, Respond, Route};
pub use matcher::{AddressSpec, MatcherSet};
