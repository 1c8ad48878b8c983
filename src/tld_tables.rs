//! Compile-time TLD tables: WHOIS server map, per-registry query options,
//! per-registry response matchers, RDAP base URLs and the public-suffix set.
//!
//! These cover the TLDs the service answers authoritatively for; anything
//! else is rejected as unsupported (or routed to DNS by the mixed query).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid static regex")
}

/// Per-TLD parsing rules for raw WHOIS text. All regexes are optional; a
/// matched `re_free` short-circuits the parse to "not found". Dates are
/// parsed with the per-field layout first, then the shared layout, then
/// best-effort.
pub struct WhoisMatcher {
    pub re_free: Option<Regex>,
    pub re_registrar: Option<Regex>,
    pub re_domain_status: Option<Regex>,
    pub re_creation_date: Option<Regex>,
    pub re_expiry_date: Option<Regex>,
    pub re_name_server: Option<Regex>,
    pub datetime_layout: Option<&'static str>,
    pub creation_layout: Option<&'static str>,
    pub expiry_layout: Option<&'static str>,
}

impl WhoisMatcher {
    /// The ICANN registry data directory format shared by virtually all
    /// gTLDs (Verisign, PIR, Identity Digital, CentralNic and friends).
    fn icann(free: &str) -> Self {
        WhoisMatcher {
            re_free: Some(re(free)),
            re_registrar: Some(re(r"(?mi)^ *Registrar: *(.+)$")),
            re_domain_status: Some(re(r"(?mi)^ *Domain Status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^ *Creation Date: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^ *Registry Expiry Date: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^ *Name Server: *(.+)$")),
            datetime_layout: None,
            creation_layout: None,
            expiry_layout: None,
        }
    }
}

/// TLD -> WHOIS server host, queried on TCP/43.
pub static WHOIS_TLD_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Top generic TLDs
    map.insert("com", "whois.verisign-grs.com");
    map.insert("net", "whois.verisign-grs.com");
    map.insert("org", "whois.pir.org");
    map.insert("info", "whois.nic.info");
    map.insert("biz", "whois.nic.biz");
    map.insert("name", "whois.nic.name");
    map.insert("pro", "whois.nic.pro");

    // Popular new gTLDs
    map.insert("xyz", "whois.nic.xyz");
    map.insert("top", "whois.nic.top");
    map.insert("shop", "whois.nic.shop");
    map.insert("online", "whois.nic.online");
    map.insert("store", "whois.nic.store");
    map.insert("site", "whois.nic.site");
    map.insert("app", "whois.nic.google");
    map.insert("dev", "whois.nic.google");
    map.insert("tech", "whois.nic.tech");
    map.insert("blog", "whois.nic.blog");
    map.insert("club", "whois.nic.club");
    map.insert("live", "whois.nic.live");
    map.insert("fun", "whois.nic.fun");
    map.insert("vip", "whois.nic.vip");

    // Country code TLDs
    map.insert("cn", "whois.cnnic.cn");
    map.insert("uk", "whois.nic.uk");
    map.insert("de", "whois.denic.de");
    map.insert("jp", "whois.jprs.jp");
    map.insert("fr", "whois.afnic.fr");
    map.insert("nl", "whois.domain-registry.nl");
    map.insert("eu", "whois.eu");
    map.insert("ru", "whois.tcinet.ru");
    map.insert("us", "whois.nic.us");
    map.insert("ca", "whois.cira.ca");
    map.insert("au", "whois.auda.org.au");
    map.insert("br", "whois.registro.br");
    map.insert("in", "whois.registry.in");
    map.insert("kr", "whois.kr");
    map.insert("tw", "whois.twnic.net.tw");
    map.insert("hk", "whois.hkirc.hk");
    map.insert("sg", "whois.sgnic.sg");
    map.insert("nz", "whois.irs.net.nz");
    map.insert("ch", "whois.nic.ch");
    map.insert("it", "whois.nic.it");
    map.insert("es", "whois.nic.es");
    map.insert("pl", "whois.dns.pl");
    map.insert("cz", "whois.nic.cz");
    map.insert("se", "whois.iis.se");
    map.insert("io", "whois.nic.io");
    map.insert("co", "whois.nic.co");
    map.insert("me", "whois.nic.me");
    map.insert("tv", "whois.nic.tv");
    map.insert("cc", "ccwhois.verisign-grs.com");
    map.insert("ai", "whois.nic.ai");
    map.insert("gg", "whois.gg");
    map.insert("im", "whois.nic.im");
    map.insert("is", "whois.isnic.is");
    map.insert("sh", "whois.nic.sh");

    map
});

/// TLD -> query prefix. Some registries require flags before the domain
/// (sent as `"{prefix} {domain}\r\n"`).
pub static WHOIS_TLD_OPTIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("de", "-T dn,ace");
    map.insert("ch", "-T dn,ace");
    map
});

/// TLD -> WHOIS response matcher.
pub static WHOIS_MATCHERS: Lazy<HashMap<&'static str, WhoisMatcher>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Verisign registries answer "No match for DOMAIN".
    for tld in ["com", "net", "cc", "tv"] {
        map.insert(tld, WhoisMatcher::icann(r"(?i)No match for"));
    }

    // The usual RDDS phrasing across gTLD registries.
    for tld in [
        "org", "info", "biz", "name", "pro", "xyz", "top", "shop", "online", "store", "site",
        "app", "dev", "tech", "blog", "club", "live", "fun", "vip", "io", "co", "me", "ai", "sh",
        "us", "in", "eu",
    ] {
        map.insert(
            tld,
            WhoisMatcher::icann(r"(?i)Domain not found|NOT FOUND|No Data Found|No entries found"),
        );
    }

    map.insert(
        "cn",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No matching record")),
            re_registrar: Some(re(r"(?mi)^ *Sponsoring Registrar: *(.+)$")),
            re_domain_status: Some(re(r"(?mi)^ *Domain Status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^ *Registration Time: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^ *Expiration Time: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^ *Name Server: *(.+)$")),
            datetime_layout: Some("%Y-%m-%d %H:%M:%S"),
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "uk",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No match for|This domain name has not been registered")),
            re_registrar: Some(re(r"(?mi)^ *Registrar:\n +(.+)$")),
            re_domain_status: Some(re(r"(?mi)^ *Registration status:\n +(.+)$")),
            re_creation_date: Some(re(r"(?mi)^ *Registered on: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^ *Expiry date: *(.+)$")),
            re_name_server: Some(re(r"(?ms)^ *Name servers:\n(.+?)\n\n")),
            datetime_layout: Some("%d-%b-%Y"),
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "de",
        WhoisMatcher {
            re_free: Some(re(r"(?i)Status: *free")),
            re_registrar: None,
            re_domain_status: Some(re(r"(?mi)^Status: *(.+)$")),
            re_creation_date: None,
            re_expiry_date: None,
            re_name_server: Some(re(r"(?mi)^Nserver: *(.+)$")),
            datetime_layout: None,
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "jp",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No match!!")),
            re_registrar: None,
            re_domain_status: Some(re(r"(?mi)^\[(?:State|Status)\] *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^\[(?:Registered Date|Created on)\] *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^\[Expires on\] *(.+)$")),
            re_name_server: Some(re(r"(?mi)^\[Name Server\] *(.+)$")),
            datetime_layout: Some("%Y/%m/%d"),
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "ru",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No entries found")),
            re_registrar: Some(re(r"(?mi)^registrar: *(.+)$")),
            re_domain_status: Some(re(r"(?mi)^state: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^created: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^paid-till: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^nserver: *(.+)$")),
            datetime_layout: None,
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "fr",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No entries found|%% NOT FOUND")),
            re_registrar: Some(re(r"(?mi)^registrar: *(.+)$")),
            re_domain_status: Some(re(r"(?mi)^status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^created: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^Expiry Date: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^nserver: *(.+)$")),
            datetime_layout: None,
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "nl",
        WhoisMatcher {
            re_free: Some(re(r"(?i)is free")),
            re_registrar: Some(re(r"(?mi)^Registrar:\n +(.+)$")),
            re_domain_status: Some(re(r"(?mi)^Status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^Creation Date: *(.+)$")),
            re_expiry_date: None,
            re_name_server: Some(re(r"(?ms)^Domain nameservers:\n(.+?)\n\n")),
            datetime_layout: Some("%Y-%m-%d"),
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map.insert(
        "br",
        WhoisMatcher {
            re_free: Some(re(r"(?i)No match for")),
            re_registrar: None,
            re_domain_status: Some(re(r"(?mi)^status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^created: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^expires: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^nserver: *(.+)$")),
            datetime_layout: Some("%Y%m%d"),
            creation_layout: None,
            expiry_layout: None,
        },
    );

    // Registries with ICANN-shaped bodies but uncommon expiry labels.
    map.insert(
        "ca",
        WhoisMatcher {
            re_free: Some(re(r"(?i)Not found:")),
            re_registrar: Some(re(r"(?mi)^ *Registrar: *(.+)$")),
            re_domain_status: Some(re(r"(?mi)^ *Domain Status: *(.+)$")),
            re_creation_date: Some(re(r"(?mi)^ *Creation Date: *(.+)$")),
            re_expiry_date: Some(re(r"(?mi)^ *Expiry Date: *(.+)$")),
            re_name_server: Some(re(r"(?mi)^ *Name Server: *(.+)$")),
            datetime_layout: None,
            creation_layout: None,
            expiry_layout: None,
        },
    );

    map
});

/// TLD -> RDAP base URL, from the IANA bootstrap registry. The key set
/// doubles as the RDAP-supported TLD set: a TLD present here is looked up
/// over RDAP instead of port-43 WHOIS.
pub static RDAP_TLD_SERVERS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert("com", "https://rdap.verisign.com/com/v1/");
    map.insert("net", "https://rdap.verisign.com/net/v1/");
    map.insert("cc", "https://rdap.verisign.com/cc/v1/");
    map.insert("tv", "https://rdap.verisign.com/tv/v1/");
    map.insert("org", "https://rdap.publicinterestregistry.org/rdap/");
    map.insert("info", "https://rdap.identitydigital.services/rdap/");
    map.insert("pro", "https://rdap.identitydigital.services/rdap/");
    map.insert("io", "https://rdap.identitydigital.services/rdap/");
    map.insert("sh", "https://rdap.identitydigital.services/rdap/");
    map.insert("ac", "https://rdap.identitydigital.services/rdap/");
    map.insert("biz", "https://rdap.nic.biz/");
    map.insert("xyz", "https://rdap.centralnic.com/xyz/");
    map.insert("site", "https://rdap.centralnic.com/site/");
    map.insert("online", "https://rdap.centralnic.com/online/");
    map.insert("store", "https://rdap.centralnic.com/store/");
    map.insert("fun", "https://rdap.centralnic.com/fun/");
    map.insert("tech", "https://rdap.centralnic.com/tech/");
    map.insert("app", "https://pubapi.registry.google/rdap/");
    map.insert("dev", "https://pubapi.registry.google/rdap/");
    map.insert("page", "https://pubapi.registry.google/rdap/");
    map.insert("top", "https://rdap.zdnscloud.com/top/");
    map.insert("shop", "https://rdap.nic.shop/");
    map.insert("blog", "https://rdap.nic.blog/");
    map.insert("club", "https://rdap.nic.club/");
    map.insert("live", "https://rdap.nic.live/");
    map.insert("vip", "https://rdap.nic.vip/");
    map.insert("me", "https://rdap.nic.me/");
    map.insert("co", "https://rdap.nic.co/");
    map.insert("us", "https://rdap.nic.us/");
    map.insert("name", "https://tld-rdap.verisign.com/name/v1/");

    map
});

pub fn rdap_supported(tld: &str) -> bool {
    RDAP_TLD_SERVERS.contains_key(tld)
}

pub fn whois_supported(tld: &str) -> bool {
    WHOIS_TLD_SERVERS.contains_key(tld)
}

/// Flat public-suffix set (dot-joined suffix strings). Longest-suffix match
/// over this set decides where the registrable part of a name begins.
pub static DOMAIN_SUFFIXES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set = HashSet::new();

    // Single-label suffixes.
    for tld in [
        "com", "net", "org", "info", "biz", "name", "pro", "xyz", "top", "shop", "online",
        "store", "site", "app", "dev", "page", "tech", "blog", "club", "live", "fun", "vip",
        "cn", "uk", "de", "jp", "fr", "nl", "eu", "ru", "us", "ca", "au", "br", "in", "kr",
        "tw", "hk", "sg", "nz", "ch", "it", "es", "pl", "cz", "se", "no", "dk", "fi", "pt",
        "gr", "hu", "ro", "bg", "at", "be", "ie", "sk", "si", "lt", "lv", "ee", "ua", "io",
        "co", "me", "tv", "cc", "ai", "gg", "im", "is", "sh", "ac", "mx", "ar", "cl", "pe",
        "tr", "sa", "ae", "il", "za", "my", "th", "vn", "id", "ph", "test",
    ] {
        set.insert(tld);
    }

    // Multi-label public suffixes.
    for suffix in [
        "com.cn", "net.cn", "org.cn", "gov.cn", "edu.cn", "ac.cn", "co.uk", "org.uk", "me.uk",
        "ltd.uk", "plc.uk", "ac.uk", "gov.uk", "co.jp", "ne.jp", "or.jp", "ac.jp", "go.jp",
        "com.au", "net.au", "org.au", "id.au", "com.br", "net.br", "org.br", "co.nz", "net.nz",
        "org.nz", "co.kr", "or.kr", "co.in", "net.in", "org.in", "com.tw", "org.tw", "com.hk",
        "org.hk", "com.sg", "org.sg", "com.my", "co.za", "org.za", "com.mx", "com.ar", "com.tr",
        "com.sa", "co.il", "co.th", "com.vn", "co.id", "com.ph", "com.ua", "com.pl", "com.ru",
    ] {
        set.insert(suffix);
    }

    set
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whois_servers_cover_the_matcher_tlds() {
        for tld in WHOIS_MATCHERS.keys() {
            assert!(
                WHOIS_TLD_SERVERS.contains_key(tld),
                "matcher without server: {}",
                tld
            );
        }
    }

    #[test]
    fn verisign_matcher_recognizes_a_taken_response() {
        let matcher = &WHOIS_MATCHERS["com"];
        let body = "   Domain Name: EXAMPLE.COM\n   Registrar: RESERVED-Internet Assigned Numbers Authority\n   Creation Date: 1995-08-14T04:00:00Z\n   Registry Expiry Date: 2026-08-13T04:00:00Z\n   Domain Status: clientDeleteProhibited https://icann.org/epp#clientDeleteProhibited\n   Name Server: A.IANA-SERVERS.NET\n   Name Server: B.IANA-SERVERS.NET\n";

        assert!(!matcher.re_free.as_ref().unwrap().is_match(body));
        let registrar = matcher
            .re_registrar
            .as_ref()
            .unwrap()
            .captures(body)
            .unwrap()[1]
            .trim()
            .to_string();
        assert_eq!(registrar, "RESERVED-Internet Assigned Numbers Authority");
    }

    #[test]
    fn verisign_matcher_recognizes_a_free_response() {
        let matcher = &WHOIS_MATCHERS["com"];
        assert!(matcher
            .re_free
            .as_ref()
            .unwrap()
            .is_match("No match for \"SURELY-FREE-EXAMPLE.COM\".\r\n"));
    }

    #[test]
    fn rdap_set_and_whois_map_overlap_on_major_gtlds() {
        assert!(rdap_supported("com"));
        assert!(whois_supported("com"));
        assert!(!rdap_supported("de"));
        assert!(whois_supported("de"));
        assert!(!rdap_supported("zz"));
        assert!(!whois_supported("zz"));
    }

    #[test]
    fn suffix_set_contains_both_label_shapes() {
        assert!(DOMAIN_SUFFIXES.contains("com"));
        assert!(DOMAIN_SUFFIXES.contains("co.uk"));
        assert!(DOMAIN_SUFFIXES.contains("com.cn"));
        assert!(!DOMAIN_SUFFIXES.contains("example.com"));
    }
}
