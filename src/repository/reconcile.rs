use std::collections::HashSet;

use crate::storage::Episode;

/// Remote episodes whose guid is not present locally, in remote order.
///
/// Identity is the guid alone: a known guid with edited title or description
/// is not new, and its remote fields are never applied.
pub fn new_episodes(remote: &[Episode], local: &[Episode]) -> Vec<Episode> {
    let known: HashSet<&str> = local.iter().map(|e| e.guid.as_str()).collect();
    remote
        .iter()
        .filter(|e| !known.contains(e.guid.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn episode(guid: &str, title: &str) -> Episode {
        Episode {
            guid: guid.to_string(),
            title: title.to_string(),
            description: String::new(),
            media_url: String::new(),
            mime_type: String::new(),
            release_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration: String::new(),
        }
    }

    #[test]
    fn test_only_unknown_guids_returned_in_remote_order() {
        let remote = vec![episode("c", "C"), episode("a", "A"), episode("b", "B")];
        let local = vec![episode("a", "A")];

        let fresh = new_episodes(&remote, &local);
        assert_eq!(fresh, vec![episode("c", "C"), episode("b", "B")]);
    }

    #[test]
    fn test_empty_local_returns_everything() {
        let remote = vec![episode("a", "A"), episode("b", "B")];
        assert_eq!(new_episodes(&remote, &[]), remote);
    }

    #[test]
    fn test_same_guid_different_content_is_not_new() {
        let remote = vec![Episode {
            description: "edited upstream".into(),
            ..episode("a", "Renamed")
        }];
        let local = vec![episode("a", "Original")];
        assert!(new_episodes(&remote, &local).is_empty());
    }

    fn arb_episodes() -> impl Strategy<Value = Vec<Episode>> {
        prop::collection::vec(("[a-e]{1,2}", "[a-z]{0,8}"), 0..12).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(guid, title)| episode(&guid, &title))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_reconcile_is_deterministic(remote in arb_episodes(), local in arb_episodes()) {
            prop_assert_eq!(new_episodes(&remote, &local), new_episodes(&remote, &local));
        }

        #[test]
        fn prop_fully_synced_yields_nothing(remote in arb_episodes()) {
            prop_assert!(new_episodes(&remote, &remote).is_empty());
        }

        #[test]
        fn prop_result_is_disjoint_from_local(remote in arb_episodes(), local in arb_episodes()) {
            let fresh = new_episodes(&remote, &local);
            for e in &fresh {
                prop_assert!(local.iter().all(|l| l.guid != e.guid));
            }
            // Persisting the new ones leaves nothing left to add
            let mut synced = local.clone();
            synced.extend(fresh);
            prop_assert!(new_episodes(&remote, &synced).is_empty());
        }

        #[test]
        fn prop_result_is_subsequence_of_remote(remote in arb_episodes(), local in arb_episodes()) {
            let fresh = new_episodes(&remote, &local);
            let mut rest = remote.iter();
            for e in &fresh {
                prop_assert!(rest.any(|r| r == e));
            }
        }
    }
}
