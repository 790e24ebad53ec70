//! Venue identity: kinds, built-in venue lists and venue matching.
//!
//! The remote index interleaves records from related streams (co-located
//! workshops, similarly named venues), so every record row is checked against
//! the venue currently being crawled before it is scored.

use crate::error::{HarvestError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// CCF-listed conferences crawled by default
pub const DEFAULT_CONFERENCES: &[&str] = &[
    "ppopp", "fast", "dac", "hpca", "micro", "sc", "asplos", "isca", "usenix atc", "eurosys",
    "socc", "spaa", "podc", "fpga", "cgo", "date", "hot chips", "cluster", "iccd", "iccad",
    "icdcs", "codes+isss", "hipeac", "sigmetrics", "pact", "icpp", "ics", "vee", "ipdps",
    "performance", "hpdc", "itc", "lisa", "msst", "rtas", "euro-par", "sigcomm", "mobicom",
    "infocom", "nsdi", "sensys", "conext", "secon", "ipsn", "mobisys", "icnp", "mobihoc",
    "nossdav", "iwqos", "imc", "ccs", "eurocrypt", "s&p", "crypto", "usenix security", "ndss",
    "acsac", "asiacrypt", "esorics", "fse", "csfw", "srds", "ches", "dsn", "raid", "pkc", "tcc",
    "pldi", "popl", "sosp", "oopsla", "ase", "icse", "issta", "osdi", "fm", "ecoop", "etaps",
    "icpc", "re", "caise", "icfp", "lctes", "models", "cp", "icsoc", "saner", "icsme", "vmcai",
    "icws", "middleware", "sas", "esem", "issre", "hotos", "sigmod", "sigkdd", "icde", "sigir",
    "vldb", "cikm", "wsdm", "pods", "dasfaa", "ecml-pkdd", "iswc", "icdm", "icdt", "edbt",
    "cidr", "sdm", "recsys", "stoc", "soda", "cav", "focs", "lics", "socg", "esa", "ccc",
    "icalp", "cade/ijcar", "concur", "hscc", "sat", "cocoon", "acm mm", "siggraph", "vr",
    "ieee vis", "icmr", "si3d", "sca", "dcc", "eg", "eurovis", "sgp", "egsr", "icassp", "icme",
    "ismar", "pg", "spm", "aaai", "neurips", "acl", "cvpr", "iccv", "icml", "ijcai", "colt",
    "emnlp", "ecai", "eccv", "icra", "icaps", "iccbr", "coling", "kr", "uai", "aamas", "ppsn",
    "naacl", "cscw", "chi", "ubicomp", "uist", "group", "iui", "iss", "ecscw", "percom",
    "mobilehci", "icwsm", "www", "rtss", "wine", "cogsci", "bibm", "emsoft", "ismb", "recomb",
    "miccai",
];

/// CCF-listed journals crawled by default
pub const DEFAULT_JOURNALS: &[&str] = &[
    "tocs", "tos", "tcad", "tc", "tpds", "taco", "taas", "todaes", "tecs", "trets", "tvlsi",
    "jpdc", "jsa", "parco", "jsac", "tmc", "ton", "toit", "tomccap", "tosn", "cn", "tcom", "twc",
    "tdsc", "tifs", "tissec", "jcs", "toplas", "tosem", "tse", "tsc", "ase", "ese", "iets",
    "ist", "jfp", "jss", "re", "scp", "sosym", "stvr", "spe", "tods", "tois", "tkde", "vldbj",
    "tkdd", "tweb", "aei", "dke", "dmkd", "ejis", "ipm", "is", "jasist", "jws", "kais", "tit",
    "iandc", "sicomp", "talg", "tocl", "toms", "algorithmica", "cc", "fac", "fmsd", "informs",
    "jcss", "jgo", "jsc", "mscs", "tcs", "tog", "tip", "tvcg", "cagd", "cgf", "cad", "gm",
    "tcsvt", "tmm", "jasa", "siims", "speech com", "ai", "tpami", "ijcv", "jmlr", "tap",
    "aamas", "cviu", "tac", "taslp", "tec", "tfs", "tnnls", "ijar", "jair", "jslhr", "pr",
    "tacl", "tochi", "ijhcs", "cscw", "hci", "iwc", "ijhci", "umuai", "tsmc", "jacm",
    "proc. ieee", "scis", "cognition", "tasae", "tgars", "tits", "tmi", "tr", "tcbb", "jcst",
    "jamia", "www",
];

/// Kind of publication stream being crawled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VenueKind {
    #[default]
    Conference,
    Journal,
}

impl VenueKind {
    /// Stream identifier prefix used in `streamid:` queries
    pub fn stream_prefix(self) -> &'static str {
        match self {
            VenueKind::Conference => "conf",
            VenueKind::Journal => "journals",
        }
    }

    /// CSS class of record list items on result pages
    pub fn record_class(self) -> &'static str {
        match self {
            VenueKind::Conference => "inproceedings",
            VenueKind::Journal => "article",
        }
    }

    /// Header of the venue column in the record store
    pub fn venue_column(self) -> &'static str {
        match self {
            VenueKind::Conference => "venue",
            VenueKind::Journal => "journal",
        }
    }

    pub fn default_venues(self) -> &'static [&'static str] {
        match self {
            VenueKind::Conference => DEFAULT_CONFERENCES,
            VenueKind::Journal => DEFAULT_JOURNALS,
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VenueKind::Conference => write!(f, "conference"),
            VenueKind::Journal => write!(f, "journal"),
        }
    }
}

impl FromStr for VenueKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conference" | "conf" => Ok(VenueKind::Conference),
            "journal" | "journals" => Ok(VenueKind::Journal),
            other => Err(HarvestError::Config(format!("Unknown venue kind: {}", other))),
        }
    }
}

/// How strictly a row's venue must match the target identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Case-insensitive substring containment
    #[default]
    Loose,
    /// Identifier must appear as a delimited token and the venue must not be a workshop
    Strict,
}

impl MatchMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            MatchMode::Strict
        } else {
            MatchMode::Loose
        }
    }
}

fn identifier_regex() -> Result<&'static Regex> {
    static RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\p{L}\p{N}][\p{L}\p{N} &+\-./']*$"))
        .as_ref()
        .map_err(|e| HarvestError::Config(format!("Invalid identifier pattern: {}", e)))
}

/// Check that a venue identifier can be embedded in a stream query.
///
/// Characters such as `:`, `|`, quotes or brackets would corrupt the query
/// expression, so they are rejected as a configuration error.
pub fn validate_identifier(identifier: &str) -> Result<String> {
    let id = identifier.trim().to_lowercase();
    if id.is_empty() {
        return Err(HarvestError::Config("Venue identifier must not be empty".to_string()));
    }
    if !identifier_regex()?.is_match(&id) {
        return Err(HarvestError::Config(format!(
            "Venue identifier '{}' contains unsupported characters",
            identifier
        )));
    }
    Ok(id)
}

/// Decides whether a row's venue string belongs to one target venue.
///
/// Built once per venue crawl; the identifier is validated up front so a bad
/// identifier is reported once rather than per row.
#[derive(Debug, Clone)]
pub struct VenueMatcher {
    identifier: String,
    mode: MatchMode,
}

impl VenueMatcher {
    pub fn new(identifier: &str, mode: MatchMode) -> Result<Self> {
        Ok(Self {
            identifier: validate_identifier(identifier)?,
            mode,
        })
    }

    /// Normalized (lowercased, trimmed) identifier
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn matches(&self, venue: &str) -> bool {
        let venue = venue.to_lowercase();
        match self.mode {
            MatchMode::Loose => venue.contains(&self.identifier),
            MatchMode::Strict => {
                !venue.contains("workshop") && contains_token(&venue, &self.identifier)
            }
        }
    }
}

/// Stateless form of [`VenueMatcher::matches`]
pub fn venue_matches(venue: &str, identifier: &str, mode: MatchMode) -> Result<bool> {
    Ok(VenueMatcher::new(identifier, mode)?.matches(venue))
}

/// True if `needle` occurs in `haystack` bounded by non-alphanumeric characters
/// (or the string ends) on both sides.
fn contains_token(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, m)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
