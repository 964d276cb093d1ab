//! Relationship views over a flat project issue list.
//!
//! Sub-issue and blocking views are derived by filtering the project's
//! issues against the `parent`, `blocks_list` and `blockers_list` fields.
//! The cycle guard for sub-issue candidates is one level deep: the focal
//! issue and its direct parent are excluded, deeper ancestors are not.

use crate::model::Issue;
use serde::Serialize;

/// A related issue resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedIssue {
    pub id: String,
    /// `{project_identifier}-{sequence_id}`
    pub display_id: String,
    pub name: String,
}

impl From<&Issue> for RelatedIssue {
    fn from(issue: &Issue) -> Self {
        Self {
            id: issue.id.clone(),
            display_id: issue.display_id(),
            name: issue.name.clone(),
        }
    }
}

/// Issues whose parent is `focal_id`, in list order.
pub fn children<'a>(issues: &'a [Issue], focal_id: &str) -> Vec<&'a Issue> {
    issues
        .iter()
        .filter(|i| i.parent.as_deref() == Some(focal_id))
        .collect()
}

/// Issues that may be attached under `focal` as existing sub-issues.
///
/// Only parentless issues qualify, minus the focal issue itself and the
/// focal issue's own parent.
pub fn sub_issue_candidates<'a>(issues: &'a [Issue], focal: &Issue) -> Vec<&'a Issue> {
    issues
        .iter()
        .filter(|i| i.is_root())
        .filter(|i| i.id != focal.id)
        .filter(|i| focal.parent.as_deref() != Some(i.id.as_str()))
        .collect()
}

/// Issues blocking `focal` (its `blockers_list`), resolved for display.
///
/// Ids missing from `issues` are skipped.
pub fn blockers(issues: &[Issue], focal: &Issue) -> Vec<RelatedIssue> {
    resolve(issues, &focal.blockers_list)
}

/// Issues `focal` blocks (its `blocks_list`), resolved for display.
pub fn blocking(issues: &[Issue], focal: &Issue) -> Vec<RelatedIssue> {
    resolve(issues, &focal.blocks_list)
}

/// Issues that can be added to one of `focal`'s blocking lists.
pub fn blocking_candidates<'a>(
    issues: &'a [Issue],
    focal: &Issue,
    existing: &[String],
) -> Vec<&'a Issue> {
    issues
        .iter()
        .filter(|i| i.id != focal.id && !existing.contains(&i.id))
        .collect()
}

fn resolve(issues: &[Issue], ids: &[String]) -> Vec<RelatedIssue> {
    ids.iter()
        .filter_map(|id| issues.iter().find(|i| &i.id == id))
        .map(RelatedIssue::from)
        .collect()
}

/// Case-insensitive substring match over name or display id.
///
/// An empty query keeps everything, in order.
pub fn filter_issues<'a, I>(issues: I, query: &str) -> Vec<&'a Issue>
where
    I: IntoIterator<Item = &'a Issue>,
{
    if query.is_empty() {
        return issues.into_iter().collect();
    }

    let needle = query.to_lowercase();
    issues
        .into_iter()
        .filter(|i| {
            i.name.to_lowercase().contains(&needle)
                || i.display_id().to_lowercase().contains(&needle)
        })
        .collect()
}

/// Mirror `focal`'s blocking lists onto every other issue in `issues`.
///
/// After this, `x` lists `focal` in `blockers_list` exactly when `focal`
/// lists `x` in `blocks_list`, and likewise the other way round.
pub fn mirror_blocking_change(issues: &mut [Issue], focal: &Issue) {
    for other in issues.iter_mut().filter(|i| i.id != focal.id) {
        sync_membership(&mut other.blockers_list, &focal.id, focal.blocks_list.contains(&other.id));
        sync_membership(&mut other.blocks_list, &focal.id, focal.blockers_list.contains(&other.id));
    }
}

fn sync_membership(list: &mut Vec<String>, id: &str, present: bool) {
    let has = list.iter().any(|x| x == id);
    if present && !has {
        list.push(id.to_string());
    } else if !present && has {
        list.retain(|x| x != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProjectSummary;
    use proptest::prelude::*;

    fn issue(id: &str, name: &str, seq: i64, parent: Option<&str>) -> Issue {
        let project = ProjectSummary::new("p1", "Web", Some("WEB"));
        let mut issue = Issue::new(id, name, "acme", &project, seq);
        issue.parent = parent.map(str::to_string);
        issue
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue("a", "Bug in login", 1, None),
            issue("b", "Child of a", 2, Some("a")),
            issue("c", "Standalone", 3, None),
            issue("d", "Grandchild", 4, Some("b")),
        ]
    }

    #[test]
    fn test_children() {
        let issues = sample();
        let kids: Vec<&str> = children(&issues, "a").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(kids, vec!["b"]);
        assert!(children(&issues, "c").is_empty());
    }

    #[test]
    fn test_candidates_exclude_focal_and_parent() {
        let mut issues = sample();
        issues[1].parent = Some("a".into());
        let focal = issues[1].clone();

        let ids: Vec<&str> =
            sub_issue_candidates(&issues, &focal).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);

        let root = issues[0].clone();
        let ids: Vec<&str> =
            sub_issue_candidates(&issues, &root).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn test_candidate_guard_is_shallow() {
        // d -> b -> a: the grandparent "a" is still offered.
        let issues = sample();
        let focal = issues[3].clone();
        let ids: Vec<&str> =
            sub_issue_candidates(&issues, &focal).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_blocking_views_resolve_display_ids() {
        let mut issues = sample();
        issues[0].blockers_list = vec!["c".into(), "missing".into()];
        issues[0].blocks_list = vec!["b".into()];
        let focal = issues[0].clone();

        let b = blockers(&issues, &focal);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].display_id, "WEB-3");
        assert_eq!(blocking(&issues, &focal)[0].id, "b");

        let ids: Vec<&str> = blocking_candidates(&issues, &focal, &focal.blockers_list)
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_filter_empty_query_is_identity() {
        let issues = sample();
        let all = filter_issues(&issues, "");
        assert_eq!(all.len(), issues.len());
        assert!(all.iter().zip(&issues).all(|(a, b)| a.id == b.id));
    }

    #[test]
    fn test_filter_case_insensitive_name_or_id() {
        let issues = sample();
        let hits = filter_issues(&issues, "bug");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Bug in login");

        let hits = filter_issues(&issues, "web-3");
        assert_eq!(hits[0].id, "c");
        assert!(filter_issues(&issues, "nothing matches").is_empty());
    }

    #[test]
    fn test_mirror_blocking_change() {
        let mut issues = sample();
        issues[2].blockers_list = vec!["a".into()];
        let mut focal = issues[0].clone();
        focal.blocks_list = vec!["b".into()];
        focal.blockers_list = vec!["d".into()];

        mirror_blocking_change(&mut issues, &focal);
        assert_eq!(issues[1].blockers_list, vec!["a".to_string()]);
        assert!(issues[2].blockers_list.is_empty());
        assert_eq!(issues[3].blocks_list, vec!["a".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_candidates_exclude_focal_and_parent(
            (issues, focal) in arb_issues().prop_flat_map(|issues| {
                let len = issues.len();
                (Just(issues), 0..len)
            })
        ) {
            let focal = &issues[focal];
            for candidate in sub_issue_candidates(&issues, focal) {
                prop_assert_ne!(&candidate.id, &focal.id);
                prop_assert_ne!(Some(candidate.id.as_str()), focal.parent.as_deref());
                prop_assert!(candidate.is_root());
            }
        }

        #[test]
        fn prop_empty_query_keeps_everything(issues in arb_issues()) {
            let kept: Vec<&str> =
                filter_issues(&issues, "").iter().map(|i| i.id.as_str()).collect();
            let all: Vec<&str> = issues.iter().map(|i| i.id.as_str()).collect();
            prop_assert_eq!(kept, all);
        }

        #[test]
        fn prop_filter_ignores_query_case(issues in arb_issues(), query in "[a-zA-Z]{1,3}") {
            let ids = |q: &str| -> Vec<String> {
                filter_issues(&issues, q).iter().map(|i| i.id.clone()).collect()
            };
            let lower = ids(&query.to_lowercase());
            let upper = ids(&query.to_uppercase());
            prop_assert_eq!(&lower, &upper);
            for issue in &issues {
                if issue.name.to_lowercase().contains(&query.to_lowercase()) {
                    prop_assert!(lower.contains(&issue.id));
                }
            }
        }
    }

    /// Non-empty issue lists where each issue may point at an earlier one as parent.
    fn arb_issues() -> impl Strategy<Value = Vec<Issue>> {
        let entry = ("[a-zA-Z ]{0,8}", prop::option::of(any::<prop::sample::Index>()));
        prop::collection::vec(entry, 1..12).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(n, (name, parent))| {
                    let seq = i64::try_from(n).unwrap() + 1;
                    let parent = parent
                        .filter(|_| n > 0)
                        .map(|idx| format!("i{}", idx.index(n)));
                    issue(&format!("i{n}"), &name, seq, parent.as_deref())
                })
                .collect()
        })
    }
}
