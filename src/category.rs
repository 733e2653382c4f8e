//! The fixed change-category set and its display glyphs.
//!
//! This table is a process-wide constant (§9 DESIGN NOTES: "the
//! category-to-glyph table ... [is a] read-only process-wide constant").
//! Declaration order is also changelog section order.

use serde::{Deserialize, Serialize};

/// One of the fixed, enumerated change categories a [`ChangeItem`](crate::types::ChangeItem)
/// can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
   NewFeature,
   BugFix,
   Refactoring,
   Performance,
   Security,
   BreakingChange,
   Deprecation,
   DependencyUpdate,
   Documentation,
   Build,
   Ci,
   Tests,
   Style,
   Revert,
   Chore,
   Other,
}

/// A category/glyph pair, in declared (= changelog render) order.
pub struct CategoryEntry {
   pub category: ChangeCategory,
   pub label:    &'static str,
   pub glyph:    &'static str,
}

/// The process-wide category table. Order defines changelog section order
/// (spec §4.4 tie-break: "Changelog category order is fixed by the
/// category-to-glyph table's declared order").
pub const TABLE: &[CategoryEntry] = &[
   CategoryEntry { category: ChangeCategory::BreakingChange, label: "Breaking Change", glyph: "⚠" },
   CategoryEntry { category: ChangeCategory::NewFeature, label: "New Feature", glyph: "✨" },
   CategoryEntry { category: ChangeCategory::BugFix, label: "Bug Fix", glyph: "🐛" },
   CategoryEntry { category: ChangeCategory::Security, label: "Security", glyph: "🔒" },
   CategoryEntry { category: ChangeCategory::Performance, label: "Performance", glyph: "⚡" },
   CategoryEntry { category: ChangeCategory::Refactoring, label: "Refactoring", glyph: "♻" },
   CategoryEntry { category: ChangeCategory::Deprecation, label: "Deprecation", glyph: "🗑" },
   CategoryEntry {
      category: ChangeCategory::DependencyUpdate,
      label:    "Dependency Update",
      glyph:    "📦",
   },
   CategoryEntry { category: ChangeCategory::Documentation, label: "Documentation", glyph: "📝" },
   CategoryEntry { category: ChangeCategory::Build, label: "Build", glyph: "🔧" },
   CategoryEntry { category: ChangeCategory::Ci, label: "CI", glyph: "👷" },
   CategoryEntry { category: ChangeCategory::Tests, label: "Tests", glyph: "✅" },
   CategoryEntry { category: ChangeCategory::Style, label: "Style", glyph: "🎨" },
   CategoryEntry { category: ChangeCategory::Revert, label: "Revert", glyph: "⏪" },
   CategoryEntry { category: ChangeCategory::Chore, label: "Chore", glyph: "🔨" },
   CategoryEntry { category: ChangeCategory::Other, label: "Other", glyph: "•" },
];

impl ChangeCategory {
   /// Display label for this category, as declared in [`TABLE`].
   pub fn label(self) -> &'static str {
      TABLE
         .iter()
         .find(|e| e.category == self)
         .map_or("Other", |e| e.label)
   }

   /// Display glyph for this category, as declared in [`TABLE`].
   pub fn glyph(self) -> &'static str {
      TABLE
         .iter()
         .find(|e| e.category == self)
         .map_or("•", |e| e.glyph)
   }

   /// Categories that never block a commit from being treated as "trivial"
   /// (§3a: triviality classification).
   pub const fn is_trivial_category(self) -> bool {
      matches!(
         self,
         Self::Chore | Self::Style | Self::Tests | Self::Ci | Self::Documentation
      )
   }

   /// Render order for changelog sections (position in [`TABLE`]).
   pub fn render_rank(self) -> usize {
      TABLE
         .iter()
         .position(|e| e.category == self)
         .unwrap_or(usize::MAX)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn every_category_has_a_table_entry() {
      let all = [
         ChangeCategory::NewFeature,
         ChangeCategory::BugFix,
         ChangeCategory::Refactoring,
         ChangeCategory::Performance,
         ChangeCategory::Security,
         ChangeCategory::BreakingChange,
         ChangeCategory::Deprecation,
         ChangeCategory::DependencyUpdate,
         ChangeCategory::Documentation,
         ChangeCategory::Build,
         ChangeCategory::Ci,
         ChangeCategory::Tests,
         ChangeCategory::Style,
         ChangeCategory::Revert,
         ChangeCategory::Chore,
         ChangeCategory::Other,
      ];
      for cat in all {
         assert_ne!(cat.label(), "");
         assert_ne!(cat.glyph(), "");
      }
   }

   #[test]
   fn breaking_change_renders_first() {
      assert_eq!(ChangeCategory::BreakingChange.render_rank(), 0);
   }

   #[test]
   fn trivial_categories_match_spec() {
      assert!(ChangeCategory::Chore.is_trivial_category());
      assert!(ChangeCategory::Style.is_trivial_category());
      assert!(ChangeCategory::Tests.is_trivial_category());
      assert!(ChangeCategory::Ci.is_trivial_category());
      assert!(ChangeCategory::Documentation.is_trivial_category());
      assert!(!ChangeCategory::NewFeature.is_trivial_category());
      assert!(!ChangeCategory::BugFix.is_trivial_category());
   }
}
