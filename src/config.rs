//! The Gateway and Route Configuration data model (§3), plus the ambient configuration
//! surface (§2.1): plain `serde::Deserialize` structs so a host can load them from whatever
//! file format it likes via `serde_json` without this crate needing an opinion on it.
//!
//! `routes` and `bodyParsers` both distinguish three states — the field absent, explicitly
//! `null`, and an explicit value — per the Design Notes (§9). Serde can't tell "absent" from
//! "present but null" through a plain `Option<T>` field (both deserialize to `None`), so both
//! use the standard `#[serde(default = "..", deserialize_with = "..")]` double-option trick:
//! `default` only runs when the key is missing, `deserialize_with` only runs when it's present
//! (whether null or not).

use serde::de::{Deserialize, Deserializer};
use serde::Deserialize as DeriveDeserialize;
use serde_json::Value;

/// Whether a route's `routes` key was left out, set to `null`, or given an explicit list.
#[derive(Debug, Clone)]
pub enum RoutesConfig {
    /// The key was omitted: the gateway mounts a single default route (empty path, no
    /// whitelist, no aliases, JSON body parsing on) — this is what lets the "Defaults"
    /// scenarios in §8 work without any route configuration at all.
    Unset,
    /// `routes: null`: no API routes are mounted; every request falls through to asset
    /// serving (or a 404 if there are no assets either).
    Null,
    /// An explicit, ordered list of mounts.
    Set(Vec<RouteConfig>),
}

impl RoutesConfig {
    /// The mounts to compile into the route table (§4.5), expanding `Unset` into the
    /// single implicit default mount.
    pub fn into_routes(self) -> Vec<RouteConfig> {
        match self {
            RoutesConfig::Unset => vec![RouteConfig::default()],
            RoutesConfig::Null => vec![],
            RoutesConfig::Set(routes) => routes,
        }
    }
}

fn default_routes() -> RoutesConfig {
    RoutesConfig::Unset
}

fn deserialize_routes<'de, D>(deserializer: D) -> Result<RoutesConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<RouteConfig>> = Option::deserialize(deserializer)?;
    Ok(match opt {
        Some(routes) => RoutesConfig::Set(routes),
        None => RoutesConfig::Null,
    })
}

/// Whether `on` parsing is turned on for a content type, and (loosely) with what options.
/// The spec allows `json`/`urlencoded` to be `bool` or an options object; this gateway has
/// no parser-specific options to apply (size limits, strict mode, etc. are host concerns),
/// so both collapse to an on/off switch, but an options object still counts as "on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserSwitch {
    Off,
    On,
}

impl ParserSwitch {
    pub fn is_on(self) -> bool {
        self == ParserSwitch::On
    }
}

impl<'de> Deserialize<'de> for ParserSwitch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(b) => {
                if b {
                    ParserSwitch::On
                } else {
                    ParserSwitch::Off
                }
            }
            Value::Object(_) => ParserSwitch::On,
            _ => ParserSwitch::Off,
        })
    }
}

/// Whether a route's `bodyParsers` key was left out, set to `null`, or given explicit
/// per-content-type switches (§4.3, §9).
#[derive(Debug, Clone)]
pub enum BodyParsersConfig {
    /// Key omitted: JSON parsing is on by default, url-encoded parsing is off. This default
    /// is what lets routes in §8's scenarios accept JSON bodies without configuring parsers.
    Default,
    /// `bodyParsers: null`: no parsing occurs at all; `parsedBody` stays `null`.
    Disabled,
    /// An explicit `{ json, urlencoded }` configuration.
    Enabled {
        json: ParserSwitch,
        urlencoded: ParserSwitch,
    },
}

impl BodyParsersConfig {
    pub fn json_enabled(&self) -> bool {
        match self {
            BodyParsersConfig::Default => true,
            BodyParsersConfig::Disabled => false,
            BodyParsersConfig::Enabled { json, .. } => json.is_on(),
        }
    }

    pub fn urlencoded_enabled(&self) -> bool {
        match self {
            BodyParsersConfig::Default => false,
            BodyParsersConfig::Disabled => false,
            BodyParsersConfig::Enabled { urlencoded, .. } => urlencoded.is_on(),
        }
    }
}

fn default_body_parsers() -> BodyParsersConfig {
    BodyParsersConfig::Default
}

#[derive(Debug, Clone, DeriveDeserialize)]
struct BodyParsersFields {
    #[serde(default)]
    json: ParserSwitch,
    #[serde(default)]
    urlencoded: ParserSwitch,
}

impl Default for ParserSwitch {
    fn default() -> Self {
        ParserSwitch::Off
    }
}

fn deserialize_body_parsers<'de, D>(deserializer: D) -> Result<BodyParsersConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<BodyParsersFields> = Option::deserialize(deserializer)?;
    Ok(match opt {
        Some(fields) => BodyParsersConfig::Enabled {
            json: fields.json,
            urlencoded: fields.urlencoded,
        },
        None => BodyParsersConfig::Disabled,
    })
}

/// A single mount (§3's Route Configuration).
#[derive(Debug, Clone, DeriveDeserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Mount prefix relative to the gateway's global `path` (default empty, meaning it
    /// mounts directly at the global prefix).
    #[serde(default)]
    pub path: String,
    /// `None` means "allow any action"; `Some(patterns)` restricts to matching actions.
    #[serde(default)]
    pub whitelist: Option<Vec<String>>,
    /// Declaration-ordered alias rewrites. `serde_json::Map` preserves insertion order (the
    /// `preserve_order` feature is enabled in `Cargo.toml` precisely so this holds), which is
    /// what lets first-match-wins (§4.5) behave correctly when aliases are loaded from JSON.
    #[serde(default)]
    pub aliases: serde_json::Map<String, Value>,
    #[serde(
        default = "default_body_parsers",
        deserialize_with = "deserialize_body_parsers",
        rename = "bodyParsers"
    )]
    pub body_parsers: BodyParsersConfig,
}

impl Default for RouteConfig {
    fn default() -> Self {
        RouteConfig {
            path: String::new(),
            whitelist: None,
            aliases: serde_json::Map::new(),
            body_parsers: BodyParsersConfig::Default,
        }
    }
}

/// Static-asset serving configuration (C4, §4.4).
#[derive(Debug, Clone, DeriveDeserialize)]
pub struct AssetsConfig {
    pub folder: String,
}

/// In-memory TLS material; presence on [`GatewayConfig`] flips the listener to HTTPS
/// (§3). Certificate *provisioning* is out of scope (§1) — the gateway just accepts bytes.
#[derive(Clone)]
pub struct HttpsConfig {
    pub key: Vec<u8>,
    pub cert: Vec<u8>,
}

impl std::fmt::Debug for HttpsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsConfig")
            .field("key", &format!("<{} bytes>", self.key.len()))
            .field("cert", &format!("<{} bytes>", self.cert.len()))
            .finish()
    }
}

fn default_ip() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    3000
}

/// The top-level, immutable-after-start Gateway Configuration (§3).
#[derive(Debug, Clone, DeriveDeserialize)]
pub struct GatewayConfig {
    /// Global path prefix applied in front of every mount's own `path` (default empty).
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_routes", deserialize_with = "deserialize_routes")]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub assets: Option<AssetsConfig>,
    #[serde(default, skip_deserializing)]
    pub https: Option<HttpsConfig>,
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long the gateway waits on the broker before giving up with a 504 (§5). `None`
    /// (the default) means no deadline is enforced.
    #[serde(default, rename = "requestTimeoutMs")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            path: String::new(),
            routes: RoutesConfig::Unset,
            assets: None,
            https: None,
            ip: default_ip(),
            port: default_port(),
            request_timeout_ms: None,
        }
    }
}
