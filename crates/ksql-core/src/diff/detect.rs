//! Structural equality predicates.
//!
//! These are symmetric: callers decide which side is old and which is new.

use crate::schema::{ColumnDescriptor, IndexDescriptor, IndexMeta, TableDescriptor};

/// Returns true if any of the ten physical column fields differ.
///
/// Compared: name, default, nullability, type, length, numeric precision,
/// numeric scale, datetime precision, comment and extra. Key role and the
/// auto-increment flag are not compared on their own: the first is
/// reflected in the indexes, the second in `extra`.
#[must_use]
pub fn column_changed(a: &ColumnDescriptor, b: &ColumnDescriptor) -> bool {
    a.name != b.name
        || a.default != b.default
        || a.nullable != b.nullable
        || a.data_type != b.data_type
        || a.column_type != b.column_type
        || a.char_length != b.char_length
        || a.numeric_precision != b.numeric_precision
        || a.numeric_scale != b.numeric_scale
        || a.datetime_precision != b.datetime_precision
        || a.comment != b.comment
        || a.extra != b.extra
}

/// Returns true if two index rows differ in name, uniqueness, position or column.
#[must_use]
pub fn index_changed(a: &IndexMeta, b: &IndexMeta) -> bool {
    a.index_name != b.index_name
        || a.non_unique != b.non_unique
        || a.seq_in_index != b.seq_in_index
        || a.column_name != b.column_name
}

/// Returns true if two indexes differ in kind, member count or any member row.
#[must_use]
pub fn index_descriptor_changed(a: &IndexDescriptor, b: &IndexDescriptor) -> bool {
    a.kind() != b.kind()
        || a.members().len() != b.members().len()
        || a
            .members()
            .iter()
            .zip(b.members())
            .any(|(x, y)| index_changed(x, y))
}

/// Returns true if engine, collation or comment differ.
#[must_use]
pub fn table_options_changed(a: &TableDescriptor, b: &TableDescriptor) -> bool {
    a.engine != b.engine || a.collation != b.collation || a.comment != b.comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::KeyRole;

    fn base() -> ColumnDescriptor {
        ColumnDescriptor::new("name", "varchar(10)")
            .not_null()
            .default_value("x")
            .comment("user name")
    }

    #[test]
    fn identical_columns_are_unchanged() {
        assert!(!column_changed(&base(), &base()));
    }

    fn assert_detected(field: &str, mutate: impl Fn(&mut ColumnDescriptor)) {
        let mut changed = base();
        mutate(&mut changed);
        assert!(column_changed(&base(), &changed), "{field} not detected");
        assert!(column_changed(&changed, &base()), "{field} not symmetric");
    }

    #[test]
    fn every_field_is_detected() {
        assert_detected("name", |c| c.name = "other".into());
        assert_detected("default", |c| c.default = None);
        assert_detected("nullable", |c| c.nullable = true);
        assert_detected("type", |c| c.column_type = "char(10)".into());
        assert_detected("length", |c| c.char_length = Some(11));
        assert_detected("precision", |c| c.numeric_precision = Some(5));
        assert_detected("scale", |c| c.numeric_scale = Some(2));
        assert_detected("datetime precision", |c| c.datetime_precision = Some(6));
        assert_detected("comment", |c| c.comment = "changed".into());
        assert_detected("extra", |c| c.extra = "on update CURRENT_TIMESTAMP".into());
    }

    #[test]
    fn empty_default_differs_from_no_default() {
        let a = ColumnDescriptor::new("a", "varchar(5)");
        let b = ColumnDescriptor::new("a", "varchar(5)").default_value("");
        assert!(column_changed(&a, &b));
    }

    #[test]
    fn key_role_alone_is_not_a_column_change() {
        let a = base();
        let b = base().key(KeyRole::Multiple);
        assert!(!column_changed(&a, &b));
    }

    #[test]
    fn index_row_fields() {
        let a = IndexMeta::new("ix", "t", "a", 1, true);
        assert!(!index_changed(&a, &a.clone()));
        assert!(index_changed(&a, &IndexMeta::new("ix2", "t", "a", 1, true)));
        assert!(index_changed(&a, &IndexMeta::new("ix", "t", "a", 1, false)));
        assert!(index_changed(&a, &IndexMeta::new("ix", "t", "a", 2, true)));
        assert!(index_changed(&a, &IndexMeta::new("ix", "t", "b", 1, true)));
        // Comment and table are not part of the comparison.
        assert!(!index_changed(&a, &IndexMeta::new("ix", "u", "a", 1, true).comment("c")));
    }

    #[test]
    fn index_member_count_matters() {
        let a = IndexDescriptor::new(IndexMeta::new("ix", "t", "a", 1, true));
        let mut b = a.clone();
        b.push(IndexMeta::new("ix", "t", "b", 2, true)).unwrap();
        assert!(index_descriptor_changed(&a, &b));
        assert!(!index_descriptor_changed(&b, &b.clone()));
    }
}
