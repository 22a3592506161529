/*!
Named event counters

Every decoded inbound message increments `<kind>_receive_succeeded`,
every undecodable one `<kind>_receive_failed`. Well-formed messages that
an application has no use for count as `<kind>_receive_unhandled`.
*/

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Stats {
    counters: HashMap<String, u64>,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    /// Adds one to the counter `name`, creating it on first use
    pub fn increment(&mut self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn succeeded(&mut self, kind: &str) {
        self.increment(&format!("{}_receive_succeeded", kind));
    }

    pub fn failed(&mut self, kind: &str) {
        self.increment(&format!("{}_receive_failed", kind));
    }

    pub fn unhandled(&mut self, kind: &str) {
        self.increment(&format!("{}_receive_unhandled", kind));
    }

    /// Gets a counter. Counters that were never incremented are 0.
    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).cloned().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters() {
        let mut testee = Stats::new();
        testee.succeeded("packet_in");
        testee.succeeded("packet_in");
        testee.failed("packet_in");
        testee.unhandled("hello");
        assert_eq!(2, testee.get("packet_in_receive_succeeded"));
        assert_eq!(1, testee.get("packet_in_receive_failed"));
        assert_eq!(1, testee.get("hello_receive_unhandled"));
        assert_eq!(0, testee.get("flow_removed_receive_succeeded"));
        assert_eq!(3, testee.iter().count());
    }
}
