use xc_http::Params;

pub const USAGE: &str = "usage: xc_probe <exchange> <endpoint> [args...] [key=value...] [api=<secrets path>]";

/// Parsed `xc_probe` command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeArgs {
    pub exchange: String,
    pub endpoint: String,

    /// Positional endpoint arguments
    pub args: Vec<String>,

    /// `key=value` pairs forwarded as optional query parameters
    pub params: Params,

    /// Dotted secrets path, defaults to the exchange name
    pub api: Option<String>,
}

impl ProbeArgs {
    pub fn arg(&self, index: usize, name: &str) -> anyhow::Result<&str> {
        self.args.get(index).map(String::as_str).ok_or_else(|| anyhow::anyhow!("{} {} needs <{}>", self.exchange, self.endpoint, name))
    }

    pub fn api_path(&self) -> &str {
        self.api.as_deref().unwrap_or(&self.exchange)
    }
}

/// Parse arguments, program name first
pub fn parse_args<I>(args: I) -> Option<ProbeArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let exchange = args.next()?.to_lowercase();
    let endpoint = args.next()?;

    let mut positional = Vec::new();
    let mut params = Params::new();
    let mut api = None;

    for arg in args {
        match arg.split_once('=') {
            Some(("api", path)) => api = Some(path.to_string()),
            Some((key, value)) => params.set(key, value),
            None => positional.push(arg),
        }
    }

    Some(ProbeArgs { exchange, endpoint, args: positional, params, api })
}

/// Parses the process command line
pub fn probe_args() -> Option<ProbeArgs> {
    parse_args(std::env::args())
}
