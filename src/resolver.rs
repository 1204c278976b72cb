//! First-match-wins parameter resolution.
//!
//! Order: inline parameters on the pattern, the keyed table via the pattern's
//! own code, the keyed table via a code bridged from the pattern id, then the
//! hard defaults. Resolution never fails.

use crate::cache::TableCache;
use crate::params::{ExoCode, ParameterOverrides, ParameterRecord, Provenance};
use crate::pattern::Pattern;
use tracing::debug;

/// Resolved parameters and where they came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub params: ParameterRecord,
    pub provenance: Provenance,
    /// The code the pattern ended up with, own or bridged.
    pub code: Option<ExoCode>,
}

impl Resolution {
    /// Defaults with `Default` provenance.
    pub fn defaults() -> Self {
        Self {
            params: ParameterRecord::default(),
            provenance: Provenance::Default,
            code: None,
        }
    }
}

/// Resolves parameters against shared, build-once tables.
#[derive(Debug, Clone, Copy)]
pub struct ParameterResolver<'a> {
    cache: &'a TableCache,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(cache: &'a TableCache) -> Self {
        Self { cache }
    }

    /// Resolves `pattern`'s parameters.
    ///
    /// A code found through the bridge is written back onto the pattern when
    /// the pattern had none, so later lookups go straight to the table.
    pub fn resolve(&self, pattern: &mut Pattern) -> Resolution {
        if let Some(inline) = pattern.inline.filter(|o| !o.is_empty()) {
            return self.finish(pattern, inline.complete(), Provenance::Inline, pattern.code);
        }

        if let Some(code) = pattern.code {
            if let Some(record) = self.cache.params().get(code) {
                return self.finish(pattern, *record, Provenance::Table, Some(code));
            }
        }

        if let Some(code) = self.cache.bridge().get(&pattern.id) {
            if pattern.code.is_none() {
                pattern.code = Some(code);
            }
            if let Some(record) = self.cache.params().get(code) {
                return self.finish(pattern, *record, Provenance::FallbackTable, Some(code));
            }
        }

        self.finish(pattern, ParameterRecord::default(), Provenance::Default, pattern.code)
    }

    /// Resolution by id alone, for callers without a parsed pattern.
    pub fn resolve_id(
        &self,
        pattern_id: &str,
        inline: Option<&ParameterOverrides>,
    ) -> (ParameterRecord, Provenance) {
        let mut pattern = Pattern::new(pattern_id);
        pattern.inline = inline.copied();
        let r = self.resolve(&mut pattern);
        (r.params, r.provenance)
    }

    fn finish(
        &self,
        pattern: &Pattern,
        params: ParameterRecord,
        provenance: Provenance,
        code: Option<ExoCode>,
    ) -> Resolution {
        debug!(pattern = %pattern.id, %provenance, mix_mode = %params.mix_mode, "parameters resolved");
        Resolution {
            params,
            provenance,
            code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TableSource;
    use crate::params::MixMode;

    const PARAMS: &str = "01101010\t2\t0.7\t1.0\txor-neighbor\tfalse\n\
                          00000001\t0\t0.3\t0.5\tmajority\ttrue\n";
    const BRIDGE: &str = "pattern_id\ttitle\texotype_8bit\n\
                          bridged\tBridged\t00000001\n\
                          orphan\tOrphan\t11111111\n";

    fn cache() -> TableCache {
        TableCache::new(TableSource::Text(PARAMS.into()), TableSource::Text(BRIDGE.into()))
    }

    #[test]
    fn inline_wins() {
        let cache = cache();
        let mut p = Pattern::new("bridged").with_code(ExoCode(0b0110_1010)).with_inline(ParameterOverrides {
            mix_mode: Some(MixMode::Reverse),
            ..Default::default()
        });
        let r = ParameterResolver::new(&cache).resolve(&mut p);
        assert_eq!(r.provenance, Provenance::Inline);
        assert_eq!(r.params.mix_mode, MixMode::Reverse);
        assert_eq!(r.params.match_threshold, 0.5);
        // inline resolution does not touch the tables
        assert!(!cache.is_params_loaded());
    }

    #[test]
    fn own_code_hits_table() {
        let cache = cache();
        let mut p = Pattern::new("software/adapter").with_code(ExoCode(0b0110_1010));
        let r = ParameterResolver::new(&cache).resolve(&mut p);
        assert_eq!(r.provenance, Provenance::Table);
        assert_eq!(r.params.rotation, 2);
        assert_eq!(r.params.mix_mode, MixMode::XorNeighbor);
    }

    #[test]
    fn bridge_code_is_cached_on_pattern() {
        let cache = cache();
        let mut p = Pattern::new("bridged");
        let r = ParameterResolver::new(&cache).resolve(&mut p);
        assert_eq!(r.provenance, Provenance::FallbackTable);
        assert_eq!(r.params.mix_mode, MixMode::Majority);
        assert!(r.params.invert_on_secondary);
        assert_eq!(p.code, Some(ExoCode(1)));
        assert_eq!(r.code, Some(ExoCode(1)));
    }

    #[test]
    fn misses_degrade_to_defaults() {
        let cache = cache();
        let resolver = ParameterResolver::new(&cache);
        let mut orphan = Pattern::new("orphan");
        let r = resolver.resolve(&mut orphan);
        assert_eq!(r.provenance, Provenance::Default);
        assert_eq!(r.params, ParameterRecord::default());
        assert_eq!(r.code, Some(ExoCode(0xff)));

        let (params, provenance) = resolver.resolve_id("unknown", None);
        assert_eq!(provenance, Provenance::Default);
        assert_eq!(params, ParameterRecord::default());

        let empty = TableCache::empty();
        let mut p = Pattern::new("bridged").with_code(ExoCode(0b0110_1010));
        assert_eq!(ParameterResolver::new(&empty).resolve(&mut p).provenance, Provenance::Default);
    }

    #[test]
    fn empty_inline_block_is_ignored() {
        let cache = cache();
        let mut p = Pattern::new("bridged").with_inline(ParameterOverrides::default());
        let r = ParameterResolver::new(&cache).resolve(&mut p);
        assert_eq!(r.provenance, Provenance::FallbackTable);
    }
}
