//! Mechanical typo-variant generation for a base domain: skipped, doubled,
//! transposed and adjacent-key letters, wrong TLDs and user-configured
//! substring replacements. All generators work on the SLD and re-attach the
//! public suffix.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::error;

use crate::config;
use crate::domain_tools::{format_tlds, sld, tld_and_suffix};

pub const TYPO_TYPE_WWW: &str = "www";
pub const TYPO_TYPE_SKIP_LETTER: &str = "skipLetter";
pub const TYPO_TYPE_DOUBLE_LETTER: &str = "doubleLetter";
pub const TYPO_TYPE_REVERSE_LETTER: &str = "reverseLetter";
pub const TYPO_TYPE_INSERTED_LETTER: &str = "insertedLetter";
pub const TYPO_TYPE_WRONG_HORIZONTAL_KEY: &str = "wrongHorizontalKey";
pub const TYPO_TYPE_WRONG_VERTICAL_KEY: &str = "wrongVerticalKey";
pub const TYPO_TYPE_WRONG_TLDS: &str = "wrongTlds";
pub const TYPO_TYPE_CUSTOMIZED_REPLACE: &str = "customizedReplace";

static INSERTED_LETTER_MAP: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('q', "12aw"), ('a', "qwzs"), ('z', "asx"), ('w', "23asqe"), ('s', "wezxad"),
        ('x', "sdzc"), ('e', "34sdwr"), ('d', "erxcsf"), ('c', "dfxv"), ('r', "45dfet"),
        ('f', "rtcvdg"), ('v', "fgcb"), ('t', "56fgry"), ('g', "tyvbfh"), ('b', "ghvn"),
        ('y', "67ghtu"), ('h', "yubngj"), ('n', "hjbm"), ('u', "78hjyi"), ('j', "uinmhk"),
        ('m', "jkn"), ('i', "89jkuo"), ('k', "iomlj"), ('o', "90klip"), ('l', "opk"),
        ('p', "0-lo"), ('1', "q2"), ('2', "qw13"), ('3', "we24"), ('4', "er35"),
        ('5', "rt46"), ('6', "ty57"), ('7', "yu68"), ('8', "ui79"), ('9', "io80"),
        ('0', "op9"),
    ])
});

static WRONG_HORIZONTAL_MAP: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('q', "w"), ('a', "s"), ('z', "x"), ('w', "qe"), ('s', "ad"), ('x', "zc"),
        ('e', "wr"), ('d', "sf"), ('c', "xv"), ('r', "et"), ('f', "dg"), ('v', "cb"),
        ('t', "ry"), ('g', "fh"), ('b', "vn"), ('y', "tu"), ('h', "gj"), ('n', "bm"),
        ('u', "yi"), ('j', "hk"), ('m', "n"), ('i', "uo"), ('k', "jl"), ('o', "ip"),
        ('l', "k"), ('p', "o"), ('1', "2"), ('2', "13"), ('3', "24"), ('4', "35"),
        ('5', "46"), ('6', "57"), ('7', "68"), ('8', "79"), ('9', "80"), ('0', "9"),
    ])
});

static WRONG_VERTICAL_MAP: Lazy<HashMap<char, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ('q', "12a"), ('a', "qwz"), ('z', "as"), ('w', "23as"), ('s', "wezx"),
        ('x', "sd"), ('e', "34sd"), ('d', "erxc"), ('c', "df"), ('r', "45df"),
        ('f', "rtcv"), ('v', "fg"), ('t', "56fg"), ('g', "tyvb"), ('b', "gh"),
        ('y', "67gh"), ('h', "yubn"), ('n', "hj"), ('u', "78hj"), ('j', "uinm"),
        ('m', "jk"), ('i', "89jk"), ('k', "iom"), ('o', "90kl"), ('l', "op"),
        ('p', "0-l"), ('1', "q"), ('2', "qw"), ('3', "we"), ('4', "er"), ('5', "rt"),
        ('6', "ty"), ('7', "yu"), ('8', "ui"), ('9', "io"), ('0', "op"),
    ])
});

pub struct TypoGenerator {
    domain: String,
}

impl TypoGenerator {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
        }
    }

    /// `(sld, suffix)` of the base domain, or None when it does not parse.
    fn parts(&self) -> Option<(Vec<char>, String)> {
        let (_, suffix) = tld_and_suffix(&self.domain).ok()?;
        let sld = sld(&self.domain);
        if sld.is_empty() {
            return None;
        }
        Some((sld.chars().collect(), suffix))
    }

    pub fn www(&self) -> Vec<String> {
        vec![format!("www{}", self.domain)]
    }

    pub fn skip_letter(&self) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };

        (0..sld.len())
            .map(|i| {
                let head: String = sld[..i].iter().collect();
                let tail: String = sld[i + 1..].iter().collect();
                format!("{head}{tail}.{suffix}")
            })
            .collect()
    }

    pub fn double_letter(&self) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };

        (0..sld.len())
            .map(|i| {
                let head: String = sld[..i].iter().collect();
                let tail: String = sld[i..].iter().collect();
                format!("{head}{}{tail}.{suffix}", sld[i])
            })
            .collect()
    }

    pub fn reverse_letter(&self) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };

        (1..sld.len())
            .map(|i| {
                let head: String = sld[..i - 1].iter().collect();
                let tail: String = sld[i + 1..].iter().collect();
                format!("{head}{}{}{tail}.{suffix}", sld[i], sld[i - 1])
            })
            .collect()
    }

    pub fn inserted_letter(&self) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };

        let mut domains = Vec::new();
        for i in 0..sld.len() {
            let Some(neighbors) = INSERTED_LETTER_MAP.get(&sld[i]) else {
                continue;
            };
            for neighbor in neighbors.chars() {
                let head: String = sld[..i].iter().collect();
                let tail: String = sld[i..].iter().collect();
                domains.push(format!("{head}{neighbor}{tail}.{suffix}"));

                let head: String = sld[..i + 1].iter().collect();
                let tail: String = sld[i + 1..].iter().collect();
                domains.push(format!("{head}{neighbor}{tail}.{suffix}"));
            }
        }
        domains
    }

    fn replaced_letter(&self, map: &HashMap<char, &'static str>) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };

        let mut domains = Vec::new();
        for i in 0..sld.len() {
            let Some(neighbors) = map.get(&sld[i]) else {
                continue;
            };
            for neighbor in neighbors.chars() {
                let head: String = sld[..i].iter().collect();
                let tail: String = sld[i + 1..].iter().collect();
                domains.push(format!("{head}{neighbor}{tail}.{suffix}"));
            }
        }
        domains
    }

    pub fn wrong_horizontal_key(&self) -> Vec<String> {
        self.replaced_letter(&WRONG_HORIZONTAL_MAP)
    }

    pub fn wrong_vertical_key(&self) -> Vec<String> {
        self.replaced_letter(&WRONG_VERTICAL_MAP)
    }

    pub fn wrong_tlds(&self, tld_list: &[String]) -> Vec<String> {
        let sld = sld(&self.domain);
        if sld.is_empty() {
            return Vec::new();
        }

        format_tlds(tld_list)
            .into_iter()
            .map(|tld| format!("{sld}.{tld}"))
            .collect()
    }

    /// `TypoCustomizedReplaces` entries are `from:to` pairs applied to the
    /// SLD.
    pub fn customized_replace(&self) -> Vec<String> {
        let Some((sld, suffix)) = self.parts() else {
            return Vec::new();
        };
        let sld: String = sld.iter().collect();

        let cfg = config::get();
        let mut domains = Vec::new();
        for item in &cfg.typo_customized_replaces {
            let pieces: Vec<&str> = item.split(':').map(|p| p.trim()).collect();
            if pieces.len() != 2 {
                error!("Wrong typo customized replaces item: {}", item);
                continue;
            }
            let new_sld = sld.replace(pieces[0], pieces[1]);
            domains.push(format!("{new_sld}.{suffix}"));
        }
        domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn www_prefixes_the_whole_domain() {
        assert_eq!(TypoGenerator::new("example.com").www(), vec!["wwwexample.com"]);
    }

    #[test]
    fn skip_letter_drops_each_position_once() {
        let domains = TypoGenerator::new("abc.com").skip_letter();
        assert_eq!(domains, vec!["bc.com", "ac.com", "ab.com"]);
    }

    #[test]
    fn double_letter_doubles_each_position_once() {
        let domains = TypoGenerator::new("ab.com").double_letter();
        assert_eq!(domains, vec!["aab.com", "abb.com"]);
    }

    #[test]
    fn reverse_letter_swaps_adjacent_pairs() {
        let domains = TypoGenerator::new("abc.com").reverse_letter();
        assert_eq!(domains, vec!["bac.com", "acb.com"]);
    }

    #[test]
    fn wrong_horizontal_key_replaces_by_keyboard_neighbor() {
        let domains = TypoGenerator::new("q.com").wrong_horizontal_key();
        assert_eq!(domains, vec!["w.com"]);
    }

    #[test]
    fn inserted_letter_inserts_on_both_sides() {
        let domains = TypoGenerator::new("m.com").inserted_letter();
        // 'm' neighbors are "jkn": each inserted left and right.
        assert_eq!(domains.len(), 6);
        assert!(domains.contains(&"jm.com".to_string()));
        assert!(domains.contains(&"mj.com".to_string()));
    }

    #[test]
    fn wrong_tlds_reattach_the_sld() {
        let domains =
            TypoGenerator::new("example.com").wrong_tlds(&["cn".into(), ".de".into()]);
        assert_eq!(domains, vec!["example.cn", "example.de"]);
    }

    #[test]
    fn generators_tolerate_unparseable_domains() {
        let generator = TypoGenerator::new("not-a-domain");
        assert!(generator.skip_letter().is_empty());
        assert!(generator.wrong_tlds(&["cn".into()]).is_empty());
    }
}
