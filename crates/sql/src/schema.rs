//! Static schema table for the accounting engine's collections.
//!
//! Column names follow the engine's `$Field` naming. The table lists every
//! column the engine exposes that the builder may resolve; which of those a
//! query may actually touch is decided separately by the whitelist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Entity {
    Company,
    Ledger,
    Voucher,
    StockItem,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Company,
        Entity::Ledger,
        Entity::Voucher,
        Entity::StockItem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Company => "Company",
            Entity::Ledger => "Ledger",
            Entity::Voucher => "Voucher",
            Entity::StockItem => "StockItem",
        }
    }

    /// Case-insensitive lookup. `stock_item` and `Stock Item` are accepted too.
    pub fn parse(name: &str) -> Option<Entity> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | ' ' | '-'))
            .collect();
        Entity::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(&normalized))
    }

    pub fn names() -> Vec<String> {
        Entity::ALL.iter().map(|e| e.as_str().to_string()).collect()
    }

    pub fn table(&self) -> &'static TableSchema {
        match self {
            Entity::Company => &COMPANY,
            Entity::Ledger => &LEDGER,
            Entity::Voucher => &VOUCHER,
            Entity::StockItem => &STOCK_ITEM,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Entity::parse(s).ok_or_else(|| format!("unknown entity '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Decimal,
    Date,
    Boolean,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Decimal => "decimal",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub data_type: DataType,
    pub nullable: bool,
}

const fn col(name: &'static str, data_type: DataType, nullable: bool) -> ColumnSchema {
    ColumnSchema {
        name,
        data_type,
        nullable,
    }
}

#[derive(Debug)]
pub struct TableSchema {
    pub entity: Entity,
    pub columns: &'static [ColumnSchema],
    /// Projection used when a request names no fields.
    pub default_projection: &'static [&'static str],
    /// Column that date ranges filter on.
    pub date_column: Option<&'static str>,
}

impl TableSchema {
    /// Resolve a field name, exact match first, then case-insensitively.
    pub fn column(&self, name: &str) -> Option<&'static ColumnSchema> {
        let name = name.strip_prefix('$').unwrap_or(name);
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }
}

use DataType::{Boolean, Date, Decimal, String as Text};

static COMPANY: TableSchema = TableSchema {
    entity: Entity::Company,
    columns: &[
        col("Name", Text, false),
        col("StartOfBooks", Date, true),
        col("EndOfBooks", Date, true),
        col("Currency", Text, true),
        col("Guid", Text, false),
    ],
    default_projection: &["Name", "StartOfBooks", "EndOfBooks", "Currency"],
    date_column: None,
};

static LEDGER: TableSchema = TableSchema {
    entity: Entity::Ledger,
    columns: &[
        col("Name", Text, false),
        col("Parent", Text, true),
        col("OpeningBalance", Decimal, true),
        col("ClosingBalance", Decimal, true),
        col("IsRevenue", Boolean, true),
        col("IsExpense", Boolean, true),
        col("IsAsset", Boolean, true),
        col("IsLiability", Boolean, true),
        col("IsDebitBalance", Boolean, true),
        col("MasterId", Decimal, false),
        col("AlterId", Decimal, false),
    ],
    default_projection: &["Name", "Parent", "OpeningBalance", "ClosingBalance"],
    date_column: None,
};

static VOUCHER: TableSchema = TableSchema {
    entity: Entity::Voucher,
    columns: &[
        col("Date", Date, false),
        col("VoucherNumber", Text, true),
        col("VoucherType", Text, false),
        col("Amount", Decimal, true),
        col("Reference", Text, true),
        col("Narration", Text, true),
        col("PartyName", Text, true),
        col("MasterId", Decimal, false),
    ],
    default_projection: &[
        "Date",
        "VoucherNumber",
        "VoucherType",
        "Amount",
        "PartyName",
    ],
    date_column: Some("Date"),
};

static STOCK_ITEM: TableSchema = TableSchema {
    entity: Entity::StockItem,
    columns: &[
        col("Name", Text, false),
        col("StockGroup", Text, true),
        col("ClosingStock", Decimal, true),
        col("ClosingValue", Decimal, true),
        col("Unit", Text, true),
        col("MasterId", Decimal, false),
    ],
    default_projection: &["Name", "StockGroup", "ClosingStock", "ClosingValue", "Unit"],
    date_column: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_parse() {
        assert_eq!(Entity::parse("ledger"), Some(Entity::Ledger));
        assert_eq!(Entity::parse("Stock Item"), Some(Entity::StockItem));
        assert_eq!(Entity::parse("stock_item"), Some(Entity::StockItem));
        assert_eq!(Entity::parse("Employee"), None);
    }

    #[test]
    fn test_column_resolution() {
        let ledger = Entity::Ledger.table();
        assert_eq!(ledger.column("Parent").map(|c| c.name), Some("Parent"));
        assert_eq!(ledger.column("$Parent").map(|c| c.name), Some("Parent"));
        assert_eq!(
            ledger.column("closingbalance").map(|c| c.data_type),
            Some(DataType::Decimal)
        );
        assert!(ledger.column("Amount").is_none());
    }

    #[test]
    fn test_default_projection_resolves() {
        for entity in Entity::ALL {
            let table = entity.table();
            assert_eq!(table.entity, entity);
            for name in table.default_projection {
                assert!(table.column(name).is_some(), "{entity}.{name}");
            }
            if let Some(date) = table.date_column {
                assert_eq!(table.column(date).map(|c| c.data_type), Some(DataType::Date));
            }
        }
    }
}
