use admission_portal::{Decision, Role, RouteGuard, RouteTable, SessionData, User};
use time::{Duration, OffsetDateTime};

fn session_for(role: Option<Role>, applied: bool) -> SessionData {
    SessionData::new(
        Some(User::new("u1", role).with_applied(applied)),
        Some("token".into()),
        Duration::hours(1),
    )
}

fn redirect(to: &str) -> Decision {
    Decision::Redirect(to.to_string())
}

const STAFF: [Role; 3] = [Role::Admin, Role::Teacher, Role::Manager];
const ALL_ROLES: [Role; 4] = [Role::Admin, Role::Student, Role::Teacher, Role::Manager];

#[test]
fn static_assets_proceed_regardless_of_session() {
    let guard = RouteGuard::default();
    let paths = [
        "/images/logo.png",
        "/_next/static/chunks/main.js",
        "/_next/image",
        "/favicon.ico",
        "/uploads/passport.JPEG",
        "/api/session",
    ];
    for path in paths {
        assert_eq!(guard.decide(path, None), Decision::Proceed, "{path}");
        for role in ALL_ROLES {
            let session = session_for(Some(role), false);
            assert_eq!(guard.decide(path, Some(&session)), Decision::Proceed, "{path}");
        }
    }
}

#[test]
fn public_paths_send_staff_to_their_dashboard() {
    let guard = RouteGuard::default();
    for path in &RouteTable::default().public {
        for role in STAFF {
            let session = session_for(Some(role), true);
            assert_eq!(
                guard.decide(path, Some(&session)),
                Decision::Redirect(role.dashboard_path()),
                "{path} as {role}"
            );
        }
    }
}

#[test]
fn public_paths_open_to_students_and_anonymous() {
    let guard = RouteGuard::default();
    let student = session_for(Some(Role::Student), false);
    for path in ["/", "/auth/signin", "/auth/signup", "/about"] {
        assert_eq!(guard.decide(path, None), Decision::Proceed, "{path}");
        assert_eq!(guard.decide(path, Some(&student)), Decision::Proceed, "{path}");
    }
}

#[test]
fn protected_paths_without_session_go_to_signin() {
    let guard = RouteGuard::default();
    let paths = [
        "/dashboard",
        "/dashboard/",
        "/dashboard/admin",
        "/dashboard/student/payments",
        "/admission",
        "/admission/form",
        "/payment/tuition",
        "/profile",
    ];
    for path in paths {
        assert_eq!(guard.decide(path, None), redirect("/auth/signin"), "{path}");
    }
}

#[test]
fn expired_session_is_anonymous() {
    let guard = RouteGuard::default();
    let mut session = session_for(Some(Role::Admin), true);
    session.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);

    assert_eq!(
        guard.decide("/dashboard/admin", Some(&session)),
        redirect("/auth/signin")
    );
    assert_eq!(guard.decide("/", Some(&session)), Decision::Proceed);
}

#[test]
fn unlisted_paths_open_to_anonymous() {
    let guard = RouteGuard::default();
    assert_eq!(guard.decide("/news/open-day", None), Decision::Proceed);
    assert_eq!(guard.decide("/authors", None), Decision::Proceed);
}

#[test]
fn student_on_admin_dashboard_goes_to_student_dashboard() {
    let guard = RouteGuard::default();
    let student = session_for(Some(Role::Student), true);
    assert_eq!(
        guard.decide("/dashboard/admin", Some(&student)),
        redirect("/dashboard/student")
    );
}

#[test]
fn foreign_dashboards_redirect_to_own_role() {
    let guard = RouteGuard::default();
    for role in ALL_ROLES {
        let session = session_for(Some(role), true);
        for other in ALL_ROLES.iter().filter(|r| **r != role) {
            let path = format!("{}/reports", other.dashboard_path());
            assert_eq!(
                guard.decide(&path, Some(&session)),
                Decision::Redirect(role.dashboard_path()),
                "{path} as {role}"
            );
        }
        let own = format!("{}/reports", role.dashboard_path());
        assert_eq!(guard.decide(&own, Some(&session)), Decision::Proceed);
    }
}

#[test]
fn dashboard_root_redirects_to_role_dashboard() {
    let guard = RouteGuard::default();
    let teacher = session_for(Some(Role::Teacher), false);
    assert_eq!(
        guard.decide("/dashboard", Some(&teacher)),
        redirect("/dashboard/teacher")
    );
    assert_eq!(
        guard.decide("/dashboard/teacher", Some(&teacher)),
        Decision::Proceed
    );
}

#[test]
fn dashboard_sub_path_match_is_case_insensitive() {
    let guard = RouteGuard::default();
    let manager = session_for(Some(Role::Manager), false);
    assert_eq!(
        guard.decide("/dashboard/Manager/staff", Some(&manager)),
        Decision::Proceed
    );
}

#[test]
fn update_application_form_is_student_or_admin_only() {
    let guard = RouteGuard::default();
    let path = "/dashboard/update-application-form";

    for role in [Role::Student, Role::Admin] {
        let session = session_for(Some(role), true);
        assert_eq!(guard.decide(path, Some(&session)), Decision::Proceed, "{role}");
        assert_eq!(
            guard.decide(&format!("{path}/step-2"), Some(&session)),
            Decision::Proceed,
            "{role}"
        );
    }
    for role in [Role::Teacher, Role::Manager] {
        let session = session_for(Some(role), true);
        assert_eq!(
            guard.decide(path, Some(&session)),
            Decision::Redirect(role.dashboard_path()),
            "{role}"
        );
    }
}

#[test]
fn applied_student_cannot_reopen_admission_form() {
    let guard = RouteGuard::default();
    let applied = session_for(Some(Role::Student), true);
    let fresh = session_for(Some(Role::Student), false);
    let admin = session_for(Some(Role::Admin), true);

    assert_eq!(
        guard.decide("/admission/form", Some(&applied)),
        redirect("/admission")
    );
    assert_eq!(guard.decide("/admission/form", Some(&fresh)), Decision::Proceed);
    assert_eq!(guard.decide("/admission/form", Some(&admin)), Decision::Proceed);
}

#[test]
fn unapplied_student_is_sent_to_admission() {
    let guard = RouteGuard::default();
    let fresh = session_for(Some(Role::Student), false);
    assert_eq!(
        guard.decide("/dashboard/student", Some(&fresh)),
        redirect("/admission")
    );
    assert_eq!(
        guard.decide("/dashboard/update-application-form", Some(&fresh)),
        redirect("/admission")
    );
}

#[test]
fn sandwich_mode_lets_unapplied_students_in() {
    let guard = RouteGuard::new(RouteTable::default(), true);
    let fresh = session_for(Some(Role::Student), false);
    assert_eq!(
        guard.decide("/dashboard/student", Some(&fresh)),
        Decision::Proceed
    );
    assert_eq!(
        guard.decide("/dashboard/admin", Some(&fresh)),
        redirect("/dashboard/student")
    );
}

#[test]
fn unknown_role_has_no_dashboard() {
    let guard = RouteGuard::default();
    let session = session_for(None, true);
    assert_eq!(guard.decide("/", Some(&session)), Decision::Proceed);
    assert_eq!(
        guard.decide("/dashboard/admin", Some(&session)),
        redirect("/auth/signin")
    );
    assert_eq!(guard.decide("/profile", Some(&session)), Decision::Proceed);
}

#[test]
fn other_authenticated_paths_proceed() {
    let guard = RouteGuard::default();
    let admin = session_for(Some(Role::Admin), true);
    assert_eq!(guard.decide("/admission", Some(&admin)), Decision::Proceed);
    assert_eq!(guard.decide("/payment/tuition", Some(&admin)), Decision::Proceed);
}

#[test]
fn custom_route_table() {
    let table = RouteTable {
        public: vec!["/".into(), "/open".into()],
        protected: vec!["/vault".into()],
        ..RouteTable::default()
    };
    let guard = RouteGuard::new(table, false);
    assert_eq!(guard.decide("/vault/items", None), redirect("/auth/signin"));
    assert_eq!(guard.decide("/profile", None), Decision::Proceed);
}

#[test]
fn sign_out_stays_reachable_for_every_role() {
    let guard = RouteGuard::default();
    assert_eq!(guard.decide("/auth/signout", None), Decision::Proceed);
    for role in ALL_ROLES {
        let session = session_for(Some(role), false);
        assert_eq!(
            guard.decide("/auth/signout", Some(&session)),
            Decision::Proceed,
            "{role}"
        );
    }
}
