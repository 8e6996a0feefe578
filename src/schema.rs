table! {
    certificates (id) {
        id -> Integer,
        certificate_id -> VarChar,
        user_id -> Integer,
        course_id -> Integer,
        issued_at -> Timestamp,
        completion_percentage -> Integer,
        final_score -> Nullable<Integer>,
        is_valid -> Bool,
        revoked_at -> Nullable<Timestamp>,
        revoked_by -> Nullable<Integer>,
        revocation_reason -> Nullable<VarChar>,
    }
}

table! {
    coupon_scope_categories (id) {
        id -> Integer,
        coupon_id -> Integer,
        category -> VarChar,
    }
}

table! {
    coupon_scope_courses (id) {
        id -> Integer,
        coupon_id -> Integer,
        course_id -> Integer,
    }
}

table! {
    coupon_usages (id) {
        id -> Integer,
        coupon_id -> Integer,
        user_id -> Integer,
        order_id -> Integer,
        course_id -> Integer,
        discount_amount -> BigInt,
        original_amount -> BigInt,
        final_amount -> BigInt,
        created_at -> Timestamp,
    }
}

table! {
    coupons (id) {
        id -> Integer,
        code -> VarChar,
        title -> VarChar,
        discount_type -> VarChar,
        value -> BigInt,
        max_discount -> Nullable<BigInt>,
        min_order_value -> BigInt,
        scope -> VarChar,
        usage_limit -> Nullable<Integer>,
        used_count -> Integer,
        per_user_limit -> Integer,
        is_active -> Bool,
        valid_from -> Timestamp,
        valid_until -> Timestamp,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    courses (id) {
        id -> Integer,
        title -> VarChar,
        category -> VarChar,
        price -> BigInt,
        currency -> VarChar,
        instructor_name -> VarChar,
        is_published -> Bool,
    }
}

table! {
    enrollments (id) {
        id -> Integer,
        user_id -> Integer,
        course_id -> Integer,
        completed_lessons -> Array<Integer>,
        progress -> Integer,
        status -> VarChar,
        source -> VarChar,
        order_id -> Nullable<Integer>,
        certificate_issued -> Bool,
        enrolled_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    lesson_progress (id) {
        id -> Integer,
        user_id -> Integer,
        course_id -> Integer,
        lesson_id -> Integer,
        is_completed -> Bool,
        watched_duration -> Integer,
        total_duration -> Integer,
        quiz_score -> Nullable<Integer>,
        quiz_attempts -> Integer,
        completed_at -> Nullable<Timestamp>,
        updated_at -> Timestamp,
    }
}

table! {
    lessons (id) {
        id -> Integer,
        course_id -> Integer,
        title -> VarChar,
        duration -> Integer,
        position -> Integer,
    }
}

table! {
    orders (id) {
        id -> Integer,
        user_id -> Integer,
        course_id -> Integer,
        status -> VarChar,
        original_amount -> BigInt,
        discount_amount -> BigInt,
        amount -> BigInt,
        currency -> VarChar,
        payment_method -> Nullable<VarChar>,
        coupon_id -> Nullable<Integer>,
        coupon_code -> Nullable<VarChar>,
        correlation_id -> Nullable<VarChar>,
        provider_transaction_id -> Nullable<VarChar>,
        failure_reason -> Nullable<VarChar>,
        refund_required -> Bool,
        paid_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

table! {
    users (id) {
        id -> Integer,
        name -> VarChar,
    }
}

joinable!(coupon_scope_categories -> coupons (coupon_id));
joinable!(coupon_scope_courses -> coupons (coupon_id));
joinable!(lessons -> courses (course_id));

allow_tables_to_appear_in_same_query!(
    certificates,
    coupon_scope_categories,
    coupon_scope_courses,
    coupon_usages,
    coupons,
    courses,
    enrollments,
    lesson_progress,
    lessons,
    orders,
    users,
);
