//! Indicator tables for the enricher. Single words are matched against
//! the token set, entries containing a space or an apostrophe against the
//! lower-cased text.

use engram_core::models::Domain;

pub const GREETING_INDICATORS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
];

pub const FEEDBACK_INDICATORS: &[&str] = &[
    "thanks",
    "thank you",
    "that worked",
    "it works",
    "didn't work",
    "doesn't work",
    "not what i asked",
    "perfect",
    "great answer",
    "wrong answer",
    "helpful",
];

pub const REQUEST_INDICATORS: &[&str] = &[
    "please",
    "can you",
    "could you",
    "would you",
    "i need",
    "i want",
    "i'd like",
    "help me",
];

pub const QUESTION_OPENERS: &[&str] = &[
    "what", "why", "how", "when", "where", "who", "which", "is", "are", "does", "do", "can",
    "should", "will", "did",
];

pub const COMMAND_OPENERS: &[&str] = &[
    "run", "create", "write", "fix", "delete", "remove", "show", "list", "generate", "build",
    "deploy", "add", "update", "rename", "convert", "refactor", "explain", "summarize",
    "translate", "export", "install", "configure",
];

pub const CRITICAL_INDICATORS: &[&str] = &[
    "emergency",
    "outage",
    "production down",
    "prod is down",
    "data loss",
    "security breach",
    "critical",
];

pub const HIGH_URGENCY_INDICATORS: &[&str] = &[
    "urgent",
    "asap",
    "immediately",
    "right now",
    "blocker",
    "blocking",
    "deadline",
    "quickly",
];

pub const LOW_URGENCY_INDICATORS: &[&str] = &[
    "no rush",
    "whenever",
    "low priority",
    "eventually",
    "at some point",
    "just curious",
];

pub const ERROR_INDICATORS: &[&str] = &[
    "error",
    "exception",
    "panic",
    "panicked",
    "traceback",
    "failed",
    "failure",
    "crash",
    "crashed",
    "segfault",
    "stack trace",
    "refused",
];

/// Keyword table per domain.
pub const DOMAIN_INDICATORS: &[(Domain, &[&str])] = &[
    (
        Domain::Programming,
        &[
            "rust", "python", "javascript", "typescript", "java", "golang", "function", "compile",
            "compiler", "cargo", "borrow", "struct", "class", "method", "variable", "bug",
            "debug", "refactor", "trait", "closure", "async", "thread", "lifetime", "code",
        ],
    ),
    (
        Domain::Databases,
        &[
            "sql", "postgres", "postgresql", "mysql", "sqlite", "mongodb", "redis", "query",
            "schema", "migration", "database", "transaction", "join",
        ],
    ),
    (
        Domain::Infrastructure,
        &[
            "kubernetes", "k8s", "docker", "container", "deploy", "deployment", "server", "aws",
            "gcp", "azure", "terraform", "pod", "nginx", "pipeline", "ci", "helm", "dns",
        ],
    ),
    (
        Domain::Security,
        &[
            "credentials", "vulnerability", "encrypt", "encryption", "ssl", "tls", "certificate",
            "oauth", "secret", "secrets", "permission", "cve", "firewall", "vault", "rotate",
        ],
    ),
    (
        Domain::DataScience,
        &[
            "dataset", "pandas", "numpy", "regression", "classifier", "training", "statistics",
            "feature", "notebook", "embedding", "accuracy",
        ],
    ),
    (
        Domain::Web,
        &[
            "html", "css", "react", "browser", "http", "https", "frontend", "endpoint", "cors",
            "cookie", "webpage", "url",
        ],
    ),
    (
        Domain::Mathematics,
        &[
            "equation", "integral", "proof", "matrix", "derivative", "theorem", "probability",
            "algebra", "calculus", "vector",
        ],
    ),
    (
        Domain::Writing,
        &[
            "essay", "paragraph", "grammar", "draft", "tone", "article", "rewrite", "proofread",
            "headline", "blog",
        ],
    ),
    (
        Domain::Business,
        &[
            "revenue", "invoice", "customer", "sales", "quarterly", "pricing", "refund", "budget",
            "forecast", "report", "billing", "contract",
        ],
    ),
    (
        Domain::Health,
        &[
            "symptom", "symptoms", "doctor", "medication", "sleep", "diet", "exercise", "pain",
            "allergy", "fever",
        ],
    ),
    (
        Domain::Account,
        &[
            "account", "login", "password", "signup", "profile", "username", "subscription",
            "2fa", "locked", "email",
        ],
    ),
];

/// Domains whose vocabulary counts towards technical depth.
pub const TECHNICAL_DOMAINS: &[Domain] = &[
    Domain::Programming,
    Domain::Databases,
    Domain::Infrastructure,
    Domain::Security,
    Domain::DataScience,
    Domain::Web,
    Domain::Mathematics,
];

pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "that", "this", "with", "you", "your", "have", "from", "are", "was",
    "but", "not", "can", "how", "what", "why", "when", "where", "which", "who", "will", "would",
    "could", "should", "there", "their", "then", "than", "them", "they", "into", "about", "does",
    "just", "like", "also", "only", "some", "more", "very", "been", "being", "here", "after",
    "before", "want", "need", "please", "thanks", "make", "sure", "use", "using", "get", "got",
];
