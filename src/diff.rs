//! Set difference between source and destination listings.

use nuget_feed::package::PackageVersion;

use crate::listing::VersionSet;

/// Versions present at the source and absent at the destination, in source
/// enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingVersions(Vec<PackageVersion>);

impl MissingVersions {
    /// Number of versions to mirror.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the destination is already up to date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the versions in mirroring order.
    #[must_use]
    pub fn as_slice(&self) -> &[PackageVersion] {
        &self.0
    }

    /// Iterate in mirroring order.
    pub fn iter(&self) -> std::slice::Iter<'_, PackageVersion> {
        self.0.iter()
    }
}

impl IntoIterator for MissingVersions {
    type Item = PackageVersion;
    type IntoIter = std::vec::IntoIter<PackageVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MissingVersions {
    type Item = &'a PackageVersion;
    type IntoIter = std::slice::Iter<'a, PackageVersion>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compute `source − destination` using exact string equality.
///
/// # Examples
///
/// ```
/// use nuget_mirror::diff::compute_missing;
/// use nuget_mirror::listing::VersionSet;
///
/// let source: VersionSet = ["1.0.0", "1.1.0", "2.0.0"].into_iter().collect();
/// let destination: VersionSet = ["1.1.0"].into_iter().collect();
/// let missing = compute_missing(&source, &destination);
/// let versions: Vec<&str> = missing.iter().map(|v| v.as_str()).collect();
/// assert_eq!(versions, ["1.0.0", "2.0.0"]);
/// ```
#[must_use]
pub fn compute_missing(source: &VersionSet, destination: &VersionSet) -> MissingVersions {
    MissingVersions(
        source
            .iter()
            .filter(|version| !destination.contains(version))
            .cloned()
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set(versions: &[&str]) -> VersionSet {
        versions.iter().copied().collect()
    }

    fn strings(missing: &MissingVersions) -> Vec<&str> {
        missing.iter().map(PackageVersion::as_str).collect()
    }

    #[rstest]
    #[case::empty_destination(&["1.0.0", "1.1.0", "2.0.0"], &[], &["1.0.0", "1.1.0", "2.0.0"])]
    #[case::up_to_date(&["1.0.0", "1.1.0"], &["1.0.0", "1.1.0"], &[])]
    #[case::partial(&["1.0.0", "1.1.0", "2.0.0"], &["1.1.0"], &["1.0.0", "2.0.0"])]
    #[case::destination_only_versions_ignored(&["1.0.0"], &["0.9.0", "1.0.0"], &[])]
    #[case::empty_source(&[], &["1.0.0"], &[])]
    #[case::source_order_kept(&["3.0.0", "1.0.0", "2.0.0"], &[], &["3.0.0", "1.0.0", "2.0.0"])]
    fn computes_difference(
        #[case] source: &[&str],
        #[case] destination: &[&str],
        #[case] expected: &[&str],
    ) {
        let missing = compute_missing(&set(source), &set(destination));
        assert_eq!(strings(&missing), expected);
    }

    #[rstest]
    #[case::build_metadata("1.0.0+build", "1.0.0")]
    #[case::casing("1.0.0-Beta", "1.0.0-beta")]
    #[case::trailing_zero("1.0", "1.0.0")]
    fn versions_compare_as_exact_strings(#[case] source: &str, #[case] destination: &str) {
        let missing = compute_missing(&set(&[source]), &set(&[destination]));
        assert_eq!(strings(&missing), vec![source]);
    }

    #[test]
    fn duplicate_source_entries_appear_once() {
        let missing = compute_missing(&set(&["1.0.0", "1.0.0"]), &set(&[]));
        assert_eq!(missing.len(), 1);
    }
}
