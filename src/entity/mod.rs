pub mod audit_logs;
pub mod cart_items;
pub mod categories;
pub mod product_techs;
pub mod products;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use product_techs::Entity as ProductTechs;
pub use products::Entity as Products;
pub use users::Entity as Users;
