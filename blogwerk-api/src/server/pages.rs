//! HTML pages. Every piece of user supplied text goes through [`escape`].

use crate::server::{
    html::{Html, escape},
    routes::{
        auth::{LoginPath, LogoutPath, RegisterPath},
        blog::{CreatePostPath, DeletePostPath, IndexPath, UpdatePostPath},
    },
};
use axum::http::StatusCode;
use axum_extra::routing::TypedPath;
use blogwerk_common::model::{post::Post, user::User};
use time::UtcDateTime;

const SITE_NAME: &str = "Blogwerk";

fn layout(
    title: &str,
    current_user: Option<&User>,
    header: &str,
    error: Option<&str>,
    content: &str,
) -> Html {
    let nav = match current_user {
        Some(user) => format!(
            r#"<li><span>{username}</span></li><li><a href="{logout}">Log Out</a></li>"#,
            username = escape(user.username.get()),
            logout = LogoutPath::PATH,
        ),
        None => format!(
            r#"<li><a href="{register}">Register</a></li><li><a href="{login}">Log In</a></li>"#,
            register = RegisterPath::PATH,
            login = LoginPath::PATH,
        ),
    };

    let flash = error
        .map(|message| format!(r#"<div class="flash">{}</div>"#, escape(message)))
        .unwrap_or_default();

    Html(format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{title} - {SITE_NAME}</title></head>
<body>
<nav><h1><a href="{index}">{SITE_NAME}</a></h1><ul>{nav}</ul></nav>
<section class="content">
<header>{header}</header>
{flash}
{content}
</section>
</body>
</html>
"#,
        title = escape(title),
        index = IndexPath::PATH,
    ))
}

fn format_date(date_time: UtcDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date_time.year(),
        u8::from(date_time.month()),
        date_time.day()
    )
}

pub fn index(current_user: Option<&User>, posts: &[Post]) -> Html {
    let mut header = String::from("<h1>Posts</h1>");
    if current_user.is_some() {
        header.push_str(&format!(
            r#"<a class="action" href="{}">New</a>"#,
            CreatePostPath::PATH
        ));
    }

    let mut content = String::new();
    for post in posts {
        let edit_link = match current_user {
            Some(user) if post.is_authored_by(user.id) => format!(
                r#"<a class="action" href="{}">Edit</a>"#,
                UpdatePostPath { id: post.id }
            ),
            _ => String::new(),
        };

        content.push_str(&format!(
            r#"<article class="post">
<header><div><h1>{title}</h1><div class="about">by {author} on {created}</div></div>{edit_link}</header>
<p class="body">{body}</p>
</article>
<hr>
"#,
            title = escape(post.content.title.get()),
            author = escape(post.author.username.get()),
            created = format_date(post.created),
            body = escape(&post.content.body),
        ));
    }

    layout("Posts", current_user, &header, None, &content)
}

fn credentials_form(submit: &str, username: &str) -> String {
    format!(
        r#"<form method="post">
<label for="username">Username</label>
<input name="username" id="username" value="{username}" required>
<label for="password">Password</label>
<input type="password" name="password" id="password" required>
<input type="submit" value="{submit}">
</form>"#,
        username = escape(username),
    )
}

pub fn register(current_user: Option<&User>, error: Option<&str>, username: &str) -> Html {
    layout(
        "Register",
        current_user,
        "<h1>Register</h1>",
        error,
        &credentials_form("Register", username),
    )
}

pub fn login(current_user: Option<&User>, error: Option<&str>, username: &str) -> Html {
    layout(
        "Log In",
        current_user,
        "<h1>Log In</h1>",
        error,
        &credentials_form("Log In", username),
    )
}

fn post_form(title: &str, body: &str) -> String {
    format!(
        r#"<form method="post">
<label for="title">Title</label>
<input name="title" id="title" value="{title}" required>
<label for="body">Body</label>
<textarea name="body" id="body">{body}</textarea>
<input type="submit" value="Save">
</form>"#,
        title = escape(title),
        body = escape(body),
    )
}

pub fn create(current_user: &User, error: Option<&str>, title: &str, body: &str) -> Html {
    layout(
        "New Post",
        Some(current_user),
        "<h1>New Post</h1>",
        error,
        &post_form(title, body),
    )
}

/// `title` and `body` are the values shown in the form, which differ from the
/// stored post when a submission is re-rendered.
pub fn update(
    current_user: &User,
    post: &Post,
    error: Option<&str>,
    title: &str,
    body: &str,
) -> Html {
    let header = format!(
        "<h1>Edit &quot;{}&quot;</h1>",
        escape(post.content.title.get())
    );
    let content = format!(
        r#"{form}
<hr>
<form action="{delete}" method="post">
<input class="danger" type="submit" value="Delete" onclick="return confirm('Are you sure?');">
</form>"#,
        form = post_form(title, body),
        delete = DeletePostPath { id: post.id },
    );

    layout("Edit", Some(current_user), &header, error, &content)
}

pub fn error(status: StatusCode, detail: Option<&str>) -> Html {
    let reason = status.canonical_reason().unwrap_or("Error");
    let header = format!("<h1>{} {}</h1>", status.as_u16(), escape(reason));
    let content = detail
        .map(|detail| format!("<p>{}</p>", escape(detail)))
        .unwrap_or_default();

    layout(reason, None, &header, None, &content)
}

#[cfg(test)]
mod tests {
    use crate::server::pages::{format_date, index};
    use blogwerk_common::model::{
        Id,
        post::{Post, PostContent, PostTitle},
        user::{User, Username},
    };
    use time::macros::utc_datetime;

    fn user(id: i64, name: &str) -> User {
        User {
            id: Id::new(id),
            username: Username::new(name.to_owned()).unwrap(),
        }
    }

    fn post(author: User) -> Post {
        Post {
            id: Id::new(4),
            author,
            content: PostContent {
                title: PostTitle::new("<b>hi</b>".to_owned()).unwrap(),
                body: "body text".to_owned(),
            },
            created: utc_datetime!(2025-03-07 23:59),
        }
    }

    #[test]
    fn dates_are_iso() {
        assert_eq!(format_date(utc_datetime!(2025-03-07 23:59)), "2025-03-07");
    }

    #[test]
    fn anonymous_index() {
        let page = index(None, &[post(user(1, "alice"))]).0;

        assert!(page.contains("Log In"));
        assert!(page.contains("Register"));
        assert!(!page.contains("Log Out"));
        assert!(!page.contains("Edit"));
        assert!(!page.contains("New"));
        assert!(page.contains("&lt;b&gt;hi&lt;/b&gt;"));
        assert!(page.contains("by alice on 2025-03-07"));
        assert!(page.contains("body text"));
    }

    #[test]
    fn edit_link_only_for_the_author() {
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let posts = [post(alice.clone())];

        let as_author = index(Some(&alice), &posts).0;
        assert!(as_author.contains(r#"href="/4/update""#));
        assert!(as_author.contains("Log Out"));
        assert!(as_author.contains("New"));

        let as_other = index(Some(&bob), &posts).0;
        assert!(!as_other.contains(r#"href="/4/update""#));
        assert!(as_other.contains("New"));
    }
}
