use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartList, GuestSession},
        categories::{CategoryCatalog, CategoryList, CreateCategoryRequest},
        products::{ProductFormSchema, ProductList, ReorderEntry, ReorderRequest},
        upload::{UploadForm, UploadResponse},
        users::{UpdateProfileRequest, UpdateRoleRequest},
    },
    models::{CartItem, Category, CategoryWithProducts, Product, ProductDetail, ProductTech, Role, User},
    response::{ApiResponse, Meta, SuccessFlag},
    routes::{admin, auth, cart, categories, health, products, upload, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::db_health,
        auth::register,
        auth::login,
        auth::logout,
        users::me,
        users::update_me,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        cart::ensure_guest_session,
        products::list_products,
        products::get_product,
        products::reorder_products,
        categories::list_catalog,
        upload::upload_image,
        admin::add_product,
        admin::update_product,
        admin::delete_product,
        admin::list_categories,
        admin::create_category,
        admin::delete_category,
        admin::set_user_role
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            ProductDetail,
            ProductTech,
            Category,
            CategoryWithProducts,
            CartItem,
            CartList,
            GuestSession,
            AddToCartRequest,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            UpdateRoleRequest,
            CreateCategoryRequest,
            CategoryList,
            CategoryCatalog,
            ProductFormSchema,
            ProductList,
            ReorderEntry,
            ReorderRequest,
            UploadForm,
            UploadResponse,
            SuccessFlag,
            Meta,
            health::HealthData,
            health::DbHealthData,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and database checks"),
        (name = "Products", description = "Public catalog"),
        (name = "Cart", description = "Guest and user carts"),
        (name = "Upload", description = "Image upload"),
        (name = "Admin", description = "Catalog administration"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "Profile endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
