/// The TTL used when neither the zone nor the record specifies one.
pub const DEFAULT_TTL: u32 = 360;

/// The clamping TTL policy for the aggregated layout: zero means
/// unset, and an answer's TTL is the lower of the zone ceiling and the
/// record's own TTL, falling back to whichever is set, or to
/// [`DEFAULT_TTL`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtlClamp {
    zone_ttl: u32,
}

impl TtlClamp {
    pub fn new(zone_ttl: u32) -> Self {
        Self { zone_ttl }
    }

    /// The configured zone ceiling, used directly for placeholder SOA
    /// data.
    pub fn zone_ttl(&self) -> u32 {
        self.zone_ttl
    }

    pub fn effective(&self, record_ttl: u32) -> u32 {
        match (self.zone_ttl, record_ttl) {
            (0, 0) => DEFAULT_TTL,
            (0, ttl) | (ttl, 0) => ttl,
            (zone, record) => zone.min(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_unset_gives_default() {
        assert_eq!(DEFAULT_TTL, TtlClamp::new(0).effective(0));
    }

    #[test]
    fn one_set_wins() {
        assert_eq!(120, TtlClamp::new(120).effective(0));
        assert_eq!(120, TtlClamp::new(0).effective(120));
    }

    #[test]
    fn both_set_takes_the_minimum() {
        assert_eq!(60, TtlClamp::new(300).effective(60));
        assert_eq!(60, TtlClamp::new(60).effective(300));
    }
}
