use core_types::SessionId;
use dom_store::DomStore;
use session::{Session, SessionConfig};
use std::error::Error;
use vdom::{HidPolicy, Node, Patch};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

struct Todo {
    id: u32,
    title: &'static str,
    done: bool,
}

fn todo_page(todos: &[Todo], filter: &str) -> Node {
    Node::element("main").with_children([
        Node::element("h1").with_child(Node::text(format!("Todos ({filter})"))),
        Node::element("input")
            .with_prop("placeholder", "What needs doing?")
            .on("input", "draft"),
        Node::element("ul").with_children(todos.iter().map(|todo| {
            Node::element("li")
                .with_key(todo.id.to_string())
                .with_prop("class", if todo.done { "done" } else { "open" })
                .with_children([
                    Node::element("input")
                        .with_prop("type", "checkbox")
                        .with_prop("checked", todo.done)
                        .on("change", "toggle"),
                    Node::text(todo.title),
                ])
        })),
    ])
}

fn print_patches(label: &str, patches: &[Patch]) {
    println!("-- {label}: {} patches", patches.len());
    for patch in patches {
        match patch {
            Patch::InsertNode {
                parent_id,
                index,
                node,
            } => println!(
                "  {} parent={} index={index} node=<{}> hid={}",
                patch.op(),
                parent_id,
                node.tag().unwrap_or("#text"),
                node.hid
            ),
            Patch::ReplaceNode { hid, node } => {
                println!("  {} {hid} -> {:?}", patch.op(), node.kind())
            }
            other => println!("  {other:?}"),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = SessionConfig {
        hid_policy: HidPolicy::All,
        ..SessionConfig::default()
    };
    let session = Session::new(SessionId(1), config);
    let page = session.page("/todos");

    let mut todos = vec![
        Todo {
            id: 1,
            title: "write the differ",
            done: true,
        },
        Todo {
            id: 2,
            title: "stamp hydration ids",
            done: false,
        },
        Todo {
            id: 3,
            title: "ship it",
            done: false,
        },
    ];

    let initial = page.render_initial(todo_page(&todos, "all"));
    println!("{} {}", initial.version, initial.html);
    let mut client = DomStore::from_tree(&page.tree().ok_or("page not rendered")?)?;

    todos[1].done = true;
    let batch = page.update(todo_page(&todos, "all"))?;
    print_patches("toggle", &batch.patches);
    client.apply(batch.from, batch.to, &batch.patches)?;

    todos.rotate_right(1);
    todos.push(Todo {
        id: 4,
        title: "celebrate",
        done: false,
    });
    let batch = page.update(todo_page(&todos, "all"))?;
    print_patches("reorder and add", &batch.patches);
    client.apply(batch.from, batch.to, &batch.patches)?;

    todos.retain(|todo| !todo.done);
    let batch = page.update(todo_page(&todos, "open"))?;
    print_patches("filter", &batch.patches);
    client.apply(batch.from, batch.to, &batch.patches)?;

    println!(
        "client at {} with {} addressable nodes",
        client.version(),
        client.hid_count()
    );
    Ok(())
}
