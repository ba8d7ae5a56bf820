//! Plain-text rendering of view state for the terminal.

use devhub_types::events::{Notice, NoticeLevel};
use devhub_types::models::{Invite, Project, Session, Visibility};
use devhub_views::{ChannelView, TeamView};

pub fn session(session: Option<&Session>) {
    match session {
        Some(s) => println!("Signed in as {} ({})", s.email, s.user_id),
        None => println!("Not signed in"),
    }
}

pub fn channel(view: &ChannelView) {
    let state = view.state();
    if let Some(error) = &state.error {
        println!("{}", error);
        return;
    }
    let Some(channel) = &state.channel else {
        return;
    };

    println!("{} (@{})", channel.name, channel.handle);
    if !channel.description.is_empty() {
        println!("{}", channel.description);
    }
    let followers = state.follow.follower_count;
    println!("{} follower{}", followers, if followers == 1 { "" } else { "s" });
    if view.can_follow() {
        println!(
            "{}{}",
            if state.follow.is_following { "Following" } else { "Not following" },
            if view.can_message() { " - messaging enabled" } else { "" }
        );
    }

    if state.projects.is_empty() {
        println!("No public projects yet");
    }
    for p in &state.projects {
        project_line(p);
    }
}

pub fn project(p: &Project) {
    project_line(p);
    if !p.description.is_empty() {
        println!("  {}", p.description);
    }
    if !p.programming_languages.is_empty() {
        println!("  languages: {}", p.programming_languages.join(", "));
    }
    if !p.tags.is_empty() {
        println!("  tags: {}", p.tags.join(", "));
    }
    println!("  likes: {}", p.likes.len());
}

fn project_line(p: &Project) {
    let hidden = if p.visibility == Visibility::Private { " [private]" } else { "" };
    println!("- {} ({}){}", p.title, p.project_id, hidden);
}

pub fn team(view: &TeamView) {
    let state = view.state();
    if let Some(error) = &state.error {
        println!("{}", error);
        return;
    }
    let Some(team) = &state.team else {
        return;
    };

    println!("{} ({})", team.name, team.id);
    if !team.bio.is_empty() {
        println!("{}", team.bio);
    }
    println!("{} members", view.member_count());
    for m in &state.members {
        println!("- {} [{}] {}", m.name, m.role, m.id);
    }
}

pub fn invites(invites: &[Invite]) {
    if invites.is_empty() {
        println!("No pending invites");
    }
    for i in invites {
        println!(
            "- {} ({}) as {}, invited by {}",
            i.team_name, i.team_id, i.role, i.invited_by
        );
    }
}

pub fn notices(notices: &[Notice]) {
    for n in notices {
        match n.level {
            NoticeLevel::Info => println!("{}", n.message),
            NoticeLevel::Error => eprintln!("{}", n.message),
        }
    }
}
